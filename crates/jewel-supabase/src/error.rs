//! Supabase error types.

use serde_json::Value;
use thiserror::Error;

/// Result type for Supabase operations.
pub type SupabaseResult<T> = Result<T, SupabaseError>;

/// Errors that can occur during Supabase operations.
#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Request failed ({0}): {1}")]
    RequestFailed(u16, String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SupabaseError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Map an error response to a variant.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::Unauthorized(message),
            403 => Self::PermissionDenied(message),
            404 => Self::NotFound(message),
            409 => Self::AlreadyExists(message),
            429 => Self::RateLimited(message),
            500..=599 => Self::ServerError(status, message),
            _ => Self::RequestFailed(status, message),
        }
    }

    /// Status code the error came from, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized(_) => Some(401),
            Self::PermissionDenied(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::AlreadyExists(_) => Some(409),
            Self::RateLimited(_) => Some(429),
            Self::RequestFailed(status, _) | Self::ServerError(status, _) => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            Self::Config(_) | Self::Json(_) => None,
        }
    }

    /// Message reported by Supabase, without the variant prefix.
    pub fn provider_message(&self) -> String {
        match self {
            Self::Config(m)
            | Self::Unauthorized(m)
            | Self::PermissionDenied(m)
            | Self::NotFound(m)
            | Self::AlreadyExists(m)
            | Self::RateLimited(m)
            | Self::RequestFailed(_, m)
            | Self::ServerError(_, m) => m.clone(),
            Self::Network(e) => e.to_string(),
            Self::Json(e) => e.to_string(),
        }
    }
}

/// Pull the human readable message out of a Supabase error body.
///
/// Auth endpoints use `msg` or `error_description`, storage uses `message`
/// and `error`. Non-JSON bodies are returned as-is.
pub fn extract_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };

    ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status() {
        assert!(matches!(
            SupabaseError::from_http_status(404, "User not found"),
            SupabaseError::NotFound(_)
        ));
        assert!(matches!(
            SupabaseError::from_http_status(422, "weak password"),
            SupabaseError::RequestFailed(422, _)
        ));
        assert!(matches!(
            SupabaseError::from_http_status(503, "down"),
            SupabaseError::ServerError(503, _)
        ));
        assert_eq!(SupabaseError::from_http_status(409, "dup").http_status(), Some(409));
    }

    #[test]
    fn test_extract_message_field_order() {
        assert_eq!(extract_message(r#"{"msg": "Token expired", "error": "x"}"#), "Token expired");
        assert_eq!(
            extract_message(r#"{"error": "invalid_grant", "error_description": "Bad password"}"#),
            "Bad password"
        );
        assert_eq!(extract_message(r#"{"statusCode": "400", "error": "Duplicate"}"#), "Duplicate");
        assert_eq!(extract_message("  gateway timeout "), "gateway timeout");
    }

    #[test]
    fn test_provider_message_strips_prefix() {
        let err = SupabaseError::from_http_status(400, "A user with this email address has already been registered");
        assert_eq!(
            err.provider_message(),
            "A user with this email address has already been registered"
        );
    }
}
