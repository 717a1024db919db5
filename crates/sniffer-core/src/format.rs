//! Body formatting.
//!
//! Turns raw request/response bytes into something a person can read.
//! JSON documents are pretty-printed, other text is passed through, and
//! binary payloads are not rendered at all.

use serde_json::Value;

/// Formats a body for display.
///
/// - `None` stays `None`.
/// - A JSON object or array is re-serialized with two-space indentation.
/// - Anything else is decoded as UTF-8 as-is.
/// - Bytes that are not valid UTF-8 yield `None`.
///
/// Top-level JSON scalars (`123`, `"text"`) are treated as plain text so
/// their original spelling is kept.
///
/// # Examples
///
/// ```
/// use sniffer_core::format_body;
///
/// assert_eq!(format_body(Some(b"not json".as_slice())), Some("not json".to_string()));
/// assert_eq!(format_body(Some([0xFF].as_slice())), None);
/// assert_eq!(format_body(None), None);
/// ```
pub fn format_body(bytes: Option<&[u8]>) -> Option<String> {
    let bytes = bytes?;

    if let Some(pretty) = pretty_json(bytes) {
        return Some(pretty);
    }

    std::str::from_utf8(bytes).ok().map(str::to_owned)
}

fn pretty_json(bytes: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(bytes).ok()?;
    if !(value.is_object() || value.is_array()) {
        return None;
    }
    serde_json::to_string_pretty(&value).ok()
}
