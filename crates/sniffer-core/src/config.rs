//! Capture configuration.
//!
//! Set once when the sniffer starts and immutable afterwards.
//!
//! ```json
//! {
//!   "mode": "allow_list",
//!   "patterns": ["api.example.com"],
//!   "on_empty": "capture_all"
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::filter::{EmptyPatterns, FilterMode, FilterRules};

/// Analytics and telemetry hosts ignored by default.
pub const DEFAULT_IGNORED_PATTERNS: &[&str] = &[
    "firebase",
    "googleapis",
    "crashlytics",
    "analytics",
    "app-measurement",
    "doubleclick",
];

/// Init-time capture configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// How `patterns` is interpreted.
    pub mode: FilterMode,
    /// Case-insensitive URL substrings.
    pub patterns: Vec<String>,
    /// What to capture when `patterns` is empty.
    pub on_empty: EmptyPatterns,
}

impl Default for CaptureConfig {
    /// Ignore-list mode with [`DEFAULT_IGNORED_PATTERNS`].
    fn default() -> Self {
        Self::ignore_list(DEFAULT_IGNORED_PATTERNS.iter().copied())
    }
}

impl CaptureConfig {
    /// Captures only URLs containing one of `patterns`.
    ///
    /// An empty list captures everything.
    pub fn allow_list<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: FilterMode::AllowList,
            patterns: patterns.into_iter().map(Into::into).collect(),
            on_empty: EmptyPatterns::CaptureAll,
        }
    }

    /// Captures every URL except those containing one of `patterns`.
    pub fn ignore_list<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: FilterMode::IgnoreList,
            patterns: patterns.into_iter().map(Into::into).collect(),
            on_empty: EmptyPatterns::CaptureAll,
        }
    }

    /// Captures every http/https request.
    pub fn capture_all() -> Self {
        Self::ignore_list(std::iter::empty::<String>())
    }

    /// Sets the empty-pattern policy.
    pub fn with_on_empty(mut self, on_empty: EmptyPatterns) -> Self {
        self.on_empty = on_empty;
        self
    }

    /// Parses a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Rejects configurations that could never capture anything useful.
    ///
    /// An allow-list whose patterns are all blank would silently behave like
    /// the empty-pattern policy, which is almost always a typo.
    pub fn validate(&self) -> Result<()> {
        let all_blank = self.patterns.iter().all(|p| p.trim().is_empty());
        if self.mode == FilterMode::AllowList && !self.patterns.is_empty() && all_blank {
            return Err(CoreError::Config(
                "allow_list patterns are all blank".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the normalized filter rules.
    pub fn rules(&self) -> FilterRules {
        FilterRules::new(self.mode, &self.patterns, self.on_empty)
    }
}
