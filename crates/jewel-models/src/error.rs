//! Model error types.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Confidence {0} is outside the accepted range 0.1..=1.0")]
    ConfidenceOutOfRange(f32),

    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    #[error("Invalid image URL or base64 data")]
    InvalidImageSource,
}
