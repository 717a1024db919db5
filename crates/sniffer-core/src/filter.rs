//! Host filtering.
//!
//! Decides which outgoing requests are eligible for capture. Patterns are
//! case-insensitive substrings matched against the full request URL.
//!
//! ## Modes
//!
//! - **AllowList**: capture only URLs containing at least one pattern
//! - **IgnoreList**: capture every URL except those containing a pattern
//!
//! What happens when no patterns are configured is an explicit setting
//! ([`EmptyPatterns`]) rather than something implied by the mode.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// How the pattern set is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Capture a URL only if it matches a pattern.
    AllowList,

    /// Capture a URL unless it matches a pattern.
    #[default]
    IgnoreList,
}

impl FilterMode {
    /// Returns the mode as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllowList => "allow_list",
            Self::IgnoreList => "ignore_list",
        }
    }
}

/// Outcome when the pattern set is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmptyPatterns {
    /// Every http/https request is captured.
    #[default]
    CaptureAll,

    /// Nothing is captured until patterns are configured.
    CaptureNone,
}

/// Normalized filter rules.
///
/// Patterns are trimmed and lowercased on construction; blank patterns are
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterRules {
    mode: FilterMode,
    patterns: Vec<String>,
    on_empty: EmptyPatterns,
}

impl FilterRules {
    /// Creates rules from raw patterns.
    pub fn new<I, S>(mode: FilterMode, patterns: I, on_empty: EmptyPatterns) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for pattern in patterns {
            let clean = pattern.as_ref().trim().to_lowercase();
            if clean.is_empty() {
                tracing::debug!("Dropping blank capture pattern");
                continue;
            }
            if !normalized.contains(&clean) {
                normalized.push(clean);
            }
        }

        Self {
            mode,
            patterns: normalized,
            on_empty,
        }
    }

    /// Rules that capture every http/https request.
    pub fn capture_all() -> Self {
        Self::new(
            FilterMode::IgnoreList,
            std::iter::empty::<&str>(),
            EmptyPatterns::CaptureAll,
        )
    }

    /// Returns the filter mode.
    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    /// Returns the normalized patterns.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns the empty-pattern policy.
    pub fn on_empty(&self) -> EmptyPatterns {
        self.on_empty
    }

    fn any_match(&self, url: &str) -> bool {
        self.patterns.iter().any(|pattern| url.contains(pattern.as_str()))
    }
}

/// Decides whether a request is eligible for capture.
///
/// The handled marker is checked before anything else, so a request that
/// was re-issued by the interceptor is never captured again even if the
/// patterns would match it.
///
/// # Examples
///
/// ```
/// use sniffer_core::{should_capture, EmptyPatterns, FilterMode, FilterRules};
///
/// let rules = FilterRules::new(FilterMode::AllowList, ["api.example.com"], EmptyPatterns::CaptureAll);
///
/// assert!(should_capture("https://api.example.com/v1/x", "https", false, &rules));
/// assert!(!should_capture("https://api.example.com/v1/x", "https", true, &rules));
/// assert!(!should_capture("ftp://api.example.com/", "ftp", false, &rules));
/// ```
pub fn should_capture(url: &str, scheme: &str, already_handled: bool, rules: &FilterRules) -> bool {
    if already_handled {
        return false;
    }

    if !(scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")) {
        return false;
    }

    if rules.patterns.is_empty() {
        return rules.on_empty == EmptyPatterns::CaptureAll;
    }

    let url = url.to_lowercase();
    match rules.mode {
        FilterMode::AllowList => rules.any_match(&url),
        FilterMode::IgnoreList => !rules.any_match(&url),
    }
}

/// Shared, thread-safe host filter.
///
/// Concurrent requests read the rules in parallel; replacing them takes the
/// write lock.
#[derive(Debug, Default)]
pub struct HostFilter {
    rules: RwLock<FilterRules>,
}

impl HostFilter {
    /// Creates a filter with the given rules.
    pub fn new(rules: FilterRules) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }

    /// Creates a filter that captures every http/https request.
    pub fn capture_all() -> Self {
        Self::new(FilterRules::capture_all())
    }

    /// Returns a copy of the current rules.
    pub fn rules(&self) -> FilterRules {
        self.rules.read().clone()
    }

    /// Replaces the rules.
    pub fn replace(&self, rules: FilterRules) {
        *self.rules.write() = rules;
    }

    /// Decides whether a request is eligible for capture.
    pub fn should_capture(&self, url: &str, scheme: &str, already_handled: bool) -> bool {
        let rules = self.rules.read();
        should_capture(url, scheme, already_handled, &rules)
    }
}
