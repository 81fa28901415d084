//! Ordered fallback decoding of error response bodies.

use std::fmt;

use serde_json::Value;

/// Longest raw-text body kept for messages and logs.
const MAX_TEXT_LEN: usize = 500;

/// What could be recovered from a failed response body.
///
/// Built in order: JSON first, then raw text, then nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    ParsedJson(Value),
    RawText(String),
    Unknown,
}

impl ErrorBody {
    /// Decode a response body.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
            return ErrorBody::ParsedJson(value);
        }

        match std::str::from_utf8(bytes) {
            Ok(text) if !text.trim().is_empty() => ErrorBody::RawText(truncate(text.trim())),
            _ => ErrorBody::Unknown,
        }
    }

    /// Best human-readable message in the body, if any.
    ///
    /// For JSON bodies the `error`, `message` and `detail` fields are tried in
    /// that order (a nested `error.message` counts too); other JSON is shown
    /// compactly.
    pub fn message(&self) -> Option<String> {
        match self {
            ErrorBody::ParsedJson(value) => Some(json_message(value)),
            ErrorBody::RawText(text) => Some(text.clone()),
            ErrorBody::Unknown => None,
        }
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(message) => f.write_str(&message),
            None => f.write_str("no response body"),
        }
    }
}

fn json_message(value: &Value) -> String {
    for key in ["error", "message", "detail"] {
        match value.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return s.clone(),
            Some(Value::Object(inner)) => {
                if let Some(Value::String(s)) = inner.get("message") {
                    return s.clone();
                }
            }
            _ => {}
        }
    }
    truncate(&value.to_string())
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_TEXT_LEN {
        return text.to_string();
    }
    let mut end = MAX_TEXT_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Check if a Content-Type header value denotes JSON.
pub fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || mime.ends_with("+json")
}
