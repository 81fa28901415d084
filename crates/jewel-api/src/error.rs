//! API error types.
//!
//! Every error renders as `{ "error": message, "details"?: string }`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use jewel_supabase::SupabaseError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    GatewayTimeout(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    /// Body that could not be read as the expected JSON.
    #[error("{message}")]
    InvalidBody { status: StatusCode, message: String },

    /// A provider answered with an error; its status and details are passed on.
    #[error("{message}")]
    Upstream {
        status: StatusCode,
        message: String,
        details: Option<String>,
    },

    /// Failure whose details stay hidden in production.
    #[error("{message}")]
    Internal {
        message: String,
        details: Option<String>,
    },

    #[error("Supabase error: {0}")]
    Supabase(#[from] SupabaseError),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            details: None,
        }
    }

    pub fn internal_with(msg: impl Into<String>, details: impl ToString) -> Self {
        Self::Internal {
            message: msg.into(),
            details: Some(details.to_string()),
        }
    }

    pub fn upstream(status: StatusCode, msg: impl Into<String>, details: Option<String>) -> Self {
        Self::Upstream {
            status,
            message: msg.into(),
            details,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InvalidBody { status, .. } => *status,
            ApiError::Upstream { status, .. } => *status,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Supabase(e) => match e {
                SupabaseError::NotFound(_)
                | SupabaseError::AlreadyExists(_)
                | SupabaseError::RequestFailed(..) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => Self::PayloadTooLarge("Request body too large".to_string()),
            status => Self::InvalidBody {
                status,
                message: rejection.body_text(),
            },
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let production = std::env::var("ENVIRONMENT")
            .map(|e| e.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        // Don't expose internal error details in production
        let body = match self {
            ApiError::Internal { message, details } => ErrorResponse {
                error: message,
                details: if production { None } else { details },
            },
            ApiError::Upstream { message, details, .. } => ErrorResponse {
                error: message,
                details,
            },
            ApiError::Supabase(e) if status == StatusCode::BAD_REQUEST => ErrorResponse {
                error: e.provider_message(),
                details: None,
            },
            ApiError::Supabase(e) => ErrorResponse {
                error: "Internal server error".to_string(),
                details: if production { None } else { Some(e.to_string()) },
            },
            other => ErrorResponse {
                error: other.to_string(),
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_envelope_shape() {
        let (status, body) = body_json(ApiError::not_found("User not found")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, serde_json::json!({"error": "User not found"}));
    }

    #[tokio::test]
    async fn test_upstream_keeps_status_and_details() {
        let err = ApiError::upstream(
            StatusCode::PAYMENT_REQUIRED,
            "Image reimagining failed",
            Some("Payment Required: no credits".to_string()),
        );
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["details"], "Payment Required: no credits");
    }

    #[tokio::test]
    async fn test_supabase_client_error_is_bad_request() {
        let err = ApiError::from(SupabaseError::from_http_status(422, "Password should be at least 6 characters"));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Password should be at least 6 characters");
    }
}
