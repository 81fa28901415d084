//! Segmentation client error types.

use thiserror::Error;

use jewel_models::{ModelError, UploadRejection};

use crate::decode::ErrorBody;

pub type SegmentResult<T> = Result<T, SegmentError>;

/// Errors surfaced by the client and controller APIs.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("Client configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{0}")]
    Rejected(#[from] UploadRejection),

    #[error("An upload is already in progress")]
    SessionBusy,

    #[error("Upload controller has been shut down")]
    ShutDown,

    #[error("No result to export")]
    NothingToExport,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Failure of a single request to the segmentation service.
///
/// Every variant is transient: the retry loop retries all of them until the
/// attempt ceiling is reached.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("Segmentation service returned a non-JSON response ({content_type})")]
    NonJson { content_type: String },

    #[error("Segmentation gateway unavailable (502): {body}")]
    BadGateway { body: ErrorBody },

    #[error("Segmentation service returned {status}: {body}")]
    Http { status: u16, body: ErrorBody },

    #[error("Invalid segmentation response: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Category used to pick the user-visible message after the last attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    Gateway,
    Server,
    Network,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Gateway => "gateway",
            FailureCategory::Server => "server",
            FailureCategory::Network => "network",
        }
    }
}

impl AttemptError {
    pub fn category(&self) -> FailureCategory {
        match self {
            AttemptError::BadGateway { .. } => FailureCategory::Gateway,
            AttemptError::NonJson { .. } | AttemptError::Http { .. } | AttemptError::InvalidBody(_) => {
                FailureCategory::Server
            }
            AttemptError::Network(_) => FailureCategory::Network,
        }
    }

    /// Message shown to the user once every attempt has failed.
    pub fn terminal_message(&self) -> String {
        match self {
            AttemptError::BadGateway { .. } => {
                "The segmentation service is unreachable (bad gateway). Please try again later.".to_string()
            }
            AttemptError::NonJson { content_type } => format!(
                "Error processing image: the server returned an unexpected response ({})",
                if content_type.is_empty() { "no content type" } else { content_type }
            ),
            AttemptError::Http { status, body } => match body.message() {
                Some(message) => format!("Error processing image: {}", message),
                None => format!("Error processing image: server returned status {}", status),
            },
            AttemptError::InvalidBody(_) => {
                "Error processing image: the server returned an invalid result".to_string()
            }
            AttemptError::Network(_) => {
                "Network error while uploading image. Please check your connection and try again.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let gateway = AttemptError::BadGateway { body: ErrorBody::Unknown };
        assert_eq!(gateway.category(), FailureCategory::Gateway);
        assert!(gateway.terminal_message().contains("bad gateway"));

        let non_json = AttemptError::NonJson { content_type: "text/html".into() };
        assert_eq!(non_json.category(), FailureCategory::Server);
    }

    #[test]
    fn test_http_message_prefers_body() {
        let err = AttemptError::Http {
            status: 500,
            body: ErrorBody::RawText("out of memory".into()),
        };
        assert_eq!(err.terminal_message(), "Error processing image: out of memory");

        let err = AttemptError::Http { status: 503, body: ErrorBody::Unknown };
        assert_eq!(err.terminal_message(), "Error processing image: server returned status 503");
    }

    #[test]
    fn test_rejection_message_passes_through() {
        let err = SegmentError::from(UploadRejection::Webp);
        assert_eq!(
            err.to_string(),
            "WebP images are not supported. Please upload a JPEG or PNG image."
        );
    }
}
