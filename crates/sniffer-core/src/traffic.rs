//! Traffic records.
//!
//! A [`TrafficRecord`] is the immutable snapshot of one captured exchange.
//! Records are built once, when the exchange finishes, through
//! [`TrafficRecordBuilder`] and never change afterwards.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::format::format_body;

/// Header name to value mapping, as received.
pub type HeaderFields = BTreeMap<String, String>;

static NEXT_RECORD_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a record, never reused within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    fn next() -> Self {
        Self(NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identifier value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Coarse classification of a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    /// 1xx responses.
    Informational,
    /// 2xx responses.
    Success,
    /// 3xx responses.
    Redirection,
    /// 4xx responses.
    ClientError,
    /// 5xx and out-of-range responses.
    ServerError,
    /// The exchange failed before a response arrived.
    NoResponse,
}

impl StatusClass {
    /// Classifies an optional status code.
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            None => Self::NoResponse,
            Some(100..=199) => Self::Informational,
            Some(200..=299) => Self::Success,
            Some(300..=399) => Self::Redirection,
            Some(400..=499) => Self::ClientError,
            Some(_) => Self::ServerError,
        }
    }

    /// Returns the class as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Informational => "informational",
            Self::Success => "success",
            Self::Redirection => "redirection",
            Self::ClientError => "client_error",
            Self::ServerError => "server_error",
            Self::NoResponse => "no_response",
        }
    }
}

/// One captured HTTP exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficRecord {
    id: RecordId,
    timestamp: DateTime<Utc>,
    url: String,
    method: String,
    status_code: Option<u16>,
    request_headers: Option<HeaderFields>,
    request_body: Option<String>,
    response_headers: Option<HeaderFields>,
    response_body: Option<String>,
    #[serde(rename = "duration_secs", serialize_with = "serialize_secs")]
    duration: Duration,
    error: Option<String>,
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl TrafficRecord {
    /// Starts building a record for a request that began at `timestamp`.
    pub fn builder(
        method: impl Into<String>,
        url: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> TrafficRecordBuilder {
        TrafficRecordBuilder {
            timestamp,
            url: url.into(),
            method: method.into(),
            status_code: None,
            request_headers: None,
            request_body: None,
            response_headers: None,
            response_body: None,
            duration: Duration::ZERO,
            error: None,
        }
    }

    /// Returns the unique record id.
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Returns when the request started.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the request URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the request method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the response status, if a response arrived.
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Returns the request headers.
    pub fn request_headers(&self) -> Option<&HeaderFields> {
        self.request_headers.as_ref()
    }

    /// Returns the formatted request body.
    pub fn request_body(&self) -> Option<&str> {
        self.request_body.as_deref()
    }

    /// Returns the response headers.
    pub fn response_headers(&self) -> Option<&HeaderFields> {
        self.response_headers.as_ref()
    }

    /// Returns the formatted response body.
    pub fn response_body(&self) -> Option<&str> {
        self.response_body.as_deref()
    }

    /// Returns the time from request start to completion.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Returns the transport error that ended the exchange, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the status class.
    pub fn status_class(&self) -> StatusClass {
        StatusClass::from_status(self.status_code)
    }

    /// Returns true unless a status below 400 arrived and the exchange
    /// finished without a transport error.
    ///
    /// A 2xx response whose body failed mid-stream counts as a failure.
    pub fn is_failure(&self) -> bool {
        self.error.is_some() || self.status_code.map_or(true, |status| status >= 400)
    }

    /// Returns a one-line summary, e.g. `GET 200 • 0.12s https://host/path`.
    pub fn summary(&self) -> String {
        format!(
            "{} {} • {:.2}s {}",
            self.method,
            self.status_code.unwrap_or(0),
            self.duration.as_secs_f64(),
            self.url
        )
    }
}

/// Builder for [`TrafficRecord`].
///
/// The id is assigned in [`build`](Self::build), so a record only gets an
/// identity once it is complete.
#[derive(Debug, Clone)]
pub struct TrafficRecordBuilder {
    timestamp: DateTime<Utc>,
    url: String,
    method: String,
    status_code: Option<u16>,
    request_headers: Option<HeaderFields>,
    request_body: Option<String>,
    response_headers: Option<HeaderFields>,
    response_body: Option<String>,
    duration: Duration,
    error: Option<String>,
}

impl TrafficRecordBuilder {
    /// Sets the response status.
    pub fn status_code(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    /// Sets the request headers. An empty map is stored as absent.
    pub fn request_headers(mut self, headers: HeaderFields) -> Self {
        self.request_headers = (!headers.is_empty()).then_some(headers);
        self
    }

    /// Sets the response headers.
    pub fn response_headers(mut self, headers: HeaderFields) -> Self {
        self.response_headers = Some(headers);
        self
    }

    /// Sets the request body from raw bytes. Empty bodies are absent.
    pub fn request_body_bytes(mut self, bytes: &[u8]) -> Self {
        self.request_body = non_empty(bytes).and_then(|b| format_body(Some(b)));
        self
    }

    /// Sets the response body from raw bytes. Empty bodies are absent.
    pub fn response_body_bytes(mut self, bytes: &[u8]) -> Self {
        self.response_body = non_empty(bytes).and_then(|b| format_body(Some(b)));
        self
    }

    /// Sets the elapsed time.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Sets the transport error description.
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Builds the record and assigns it a fresh id.
    pub fn build(self) -> TrafficRecord {
        TrafficRecord {
            id: RecordId::next(),
            timestamp: self.timestamp,
            url: self.url,
            method: self.method,
            status_code: self.status_code,
            request_headers: self.request_headers,
            request_body: self.request_body,
            response_headers: self.response_headers,
            response_body: self.response_body,
            duration: self.duration,
            error: self.error,
        }
    }
}

fn non_empty(bytes: &[u8]) -> Option<&[u8]> {
    (!bytes.is_empty()).then_some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TrafficRecord {
        TrafficRecord::builder("GET", "https://api.example.com/data", Utc::now())
            .status_code(200)
            .response_body_bytes(br#"{"ok":true}"#)
            .duration(Duration::from_millis(120))
            .build()
    }

    #[test]
    fn ids_are_unique() {
        let a = sample();
        let b = sample();
        assert_ne!(a.id(), b.id());
        assert!(b.id() > a.id());
    }

    #[test]
    fn response_body_is_formatted() {
        let record = sample();
        assert_eq!(record.response_body(), Some("{\n  \"ok\": true\n}"));
    }

    #[test]
    fn empty_bodies_are_absent() {
        let record = TrafficRecord::builder("POST", "http://h.test/", Utc::now())
            .request_body_bytes(b"")
            .response_body_bytes(b"")
            .build();
        assert!(record.request_body().is_none());
        assert!(record.response_body().is_none());
    }

    #[test]
    fn binary_body_is_absent() {
        let record = TrafficRecord::builder("GET", "http://h.test/img", Utc::now())
            .response_body_bytes(&[0xFF, 0xD8, 0xFF])
            .build();
        assert!(record.response_body().is_none());
    }

    #[test]
    fn empty_request_headers_are_absent() {
        let record = TrafficRecord::builder("GET", "http://h.test/", Utc::now())
            .request_headers(HeaderFields::new())
            .build();
        assert!(record.request_headers().is_none());
    }

    #[test]
    fn status_classes() {
        assert_eq!(StatusClass::from_status(None), StatusClass::NoResponse);
        assert_eq!(StatusClass::from_status(Some(101)), StatusClass::Informational);
        assert_eq!(StatusClass::from_status(Some(204)), StatusClass::Success);
        assert_eq!(StatusClass::from_status(Some(304)), StatusClass::Redirection);
        assert_eq!(StatusClass::from_status(Some(404)), StatusClass::ClientError);
        assert_eq!(StatusClass::from_status(Some(503)), StatusClass::ServerError);
    }

    #[test]
    fn failure_detection() {
        assert!(!sample().is_failure());

        let failed = TrafficRecord::builder("GET", "http://h.test/", Utc::now())
            .error("connection refused")
            .build();
        assert!(failed.is_failure());
        assert_eq!(failed.status_class(), StatusClass::NoResponse);

        let not_found = TrafficRecord::builder("GET", "http://h.test/", Utc::now())
            .status_code(404)
            .build();
        assert!(not_found.is_failure());
    }

    #[test]
    fn body_error_after_success_status_is_failure() {
        let truncated = TrafficRecord::builder("GET", "http://h.test/", Utc::now())
            .status_code(200)
            .response_body_bytes(b"partial")
            .error("connection reset")
            .build();
        assert_eq!(truncated.status_class(), StatusClass::Success);
        assert!(truncated.is_failure());
    }

    #[test]
    fn summary_line() {
        assert_eq!(sample().summary(), "GET 200 • 0.12s https://api.example.com/data");

        let failed = TrafficRecord::builder("DELETE", "http://h.test/x", Utc::now()).build();
        assert_eq!(failed.summary(), "DELETE 0 • 0.00s http://h.test/x");
    }

    #[test]
    fn serializes_duration_as_seconds() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["method"], "GET");
        assert_eq!(json["status_code"], 200);
        assert_eq!(json["duration_secs"], 0.12);
        assert!(json["error"].is_null());
    }
}
