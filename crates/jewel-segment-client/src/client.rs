//! Segmentation service HTTP client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use jewel_models::{AcceptedImage, ConfidenceThreshold, SegmentationResult};

use crate::decode::{is_json_content_type, ErrorBody};
use crate::error::{AttemptError, SegmentError, SegmentResult};
use crate::retry::RetryPolicy;

/// Default endpoint of the segmentation service.
pub const DEFAULT_SEGMENT_URL: &str = "http://localhost:8080/segment";

/// Configuration for the segmentation client.
#[derive(Debug, Clone)]
pub struct SegmentClientConfig {
    /// Full URL of the segmentation endpoint
    pub endpoint_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Attempt ceiling and backoff step
    pub retry: RetryPolicy,
}

impl Default for SegmentClientConfig {
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_SEGMENT_URL.to_string(),
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

impl SegmentClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            endpoint_url: std::env::var("SEGMENT_SERVICE_URL")
                .unwrap_or_else(|_| DEFAULT_SEGMENT_URL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("SEGMENT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            connect_timeout: Duration::from_secs(5),
            retry: RetryPolicy::from_env(),
        }
    }
}

/// Anything that can run one segmentation attempt.
///
/// The upload controller is generic over this so the retry and session logic
/// can be driven without a live service.
#[async_trait]
pub trait Segmenter: Send + Sync {
    /// Send one request. Must not retry internally.
    async fn segment(
        &self,
        image: &AcceptedImage,
        confidence: ConfidenceThreshold,
    ) -> Result<SegmentationResult, AttemptError>;
}

#[async_trait]
impl<T: Segmenter + ?Sized> Segmenter for Arc<T> {
    async fn segment(
        &self,
        image: &AcceptedImage,
        confidence: ConfidenceThreshold,
    ) -> Result<SegmentationResult, AttemptError> {
        (**self).segment(image, confidence).await
    }
}

/// Client for the segmentation service.
#[derive(Clone)]
pub struct SegmentClient {
    http: Client,
    config: SegmentClientConfig,
}

impl SegmentClient {
    /// Create a new segmentation client.
    pub fn new(config: SegmentClientConfig) -> SegmentResult<Self> {
        Url::parse(&config.endpoint_url).map_err(|e| {
            SegmentError::Config(format!("invalid endpoint URL '{}': {}", config.endpoint_url, e))
        })?;

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("jewel-segment-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SegmentError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> SegmentResult<Self> {
        Self::new(SegmentClientConfig::from_env())
    }

    pub fn config(&self) -> &SegmentClientConfig {
        &self.config
    }

    /// Retry policy callers should apply around [`SegmentClient::segment_once`].
    pub fn retry_policy(&self) -> RetryPolicy {
        self.config.retry
    }

    /// Check if the segmentation service answers its health route.
    pub async fn health_check(&self) -> SegmentResult<bool> {
        let url = Url::parse(&self.config.endpoint_url)
            .and_then(|u| u.join("/health"))
            .map_err(|e| SegmentError::Config(e.to_string()))?;

        match self.http.get(url).send().await {
            Ok(response) if response.status().is_success() => Ok(true),
            Ok(response) => {
                warn!("Segmentation service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Segmentation service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Issue exactly one multipart request and classify the response.
    pub async fn segment_once(
        &self,
        image: &AcceptedImage,
        confidence: ConfidenceThreshold,
    ) -> Result<SegmentationResult, AttemptError> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(image.kind.mime_type())?;

        let form = Form::new()
            .part("image", part)
            .text("confidence", confidence.to_form_value());

        debug!(
            url = %self.config.endpoint_url,
            bytes = image.len(),
            confidence = %confidence,
            "Sending segmentation request"
        );

        let response = self
            .http
            .post(&self.config.endpoint_url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if status.is_success() {
            if !is_json_content_type(&content_type) {
                return Err(AttemptError::NonJson { content_type });
            }
            let body = response.bytes().await?;
            let result: SegmentationResult = serde_json::from_slice(&body)?;
            return Ok(result);
        }

        let body = ErrorBody::from_bytes(&response.bytes().await.unwrap_or_default());
        if status == StatusCode::BAD_GATEWAY {
            Err(AttemptError::BadGateway { body })
        } else {
            Err(AttemptError::Http {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl Segmenter for SegmentClient {
    async fn segment(
        &self,
        image: &AcceptedImage,
        confidence: ConfidenceThreshold,
    ) -> Result<SegmentationResult, AttemptError> {
        self.segment_once(image, confidence).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SegmentClientConfig::default();
        assert_eq!(config.endpoint_url, "http://localhost:8080/segment");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn test_rejects_invalid_endpoint() {
        let config = SegmentClientConfig {
            endpoint_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(SegmentClient::new(config), Err(SegmentError::Config(_))));
    }
}
