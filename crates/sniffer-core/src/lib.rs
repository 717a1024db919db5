//! Sniffer Core - Capture model, storage, and filtering logic.
//!
//! This crate provides everything the interception layer needs that does not
//! touch the network:
//!
//! - [`TrafficRecord`]: immutable snapshot of one captured HTTP exchange
//! - [`CaptureStore`]: thread-safe, newest-first store of records with a
//!   change feed for presentation layers
//! - [`HostFilter`]: allow-list / ignore-list policy deciding what to capture
//! - [`format_body`]: best-effort rendering of bodies as readable text
//! - [`CaptureConfig`]: init-time configuration
//!
//! # Example
//!
//! ```
//! use sniffer_core::{CaptureConfig, HostFilter};
//!
//! let config = CaptureConfig::allow_list(["api.example.com"]);
//! let filter = HostFilter::new(config.rules());
//!
//! assert!(filter.should_capture("https://api.example.com/v1/x", "https", false));
//! assert!(!filter.should_capture("https://other.com/", "https", false));
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod format;
pub mod store;
pub mod traffic;

pub use config::{CaptureConfig, DEFAULT_IGNORED_PATTERNS};
pub use error::{CoreError, Result};
pub use filter::{should_capture, EmptyPatterns, FilterMode, FilterRules, HostFilter};
pub use format::format_body;
pub use store::{CaptureStore, StoreEvent, StoreSubscription};
pub use traffic::{HeaderFields, RecordId, StatusClass, TrafficRecord, TrafficRecordBuilder};
