//! Replicate client for diffusion variations.
//!
//! Creates a prediction and polls it at a fixed interval until it settles or
//! the poll limit is reached.

use std::time::{Duration, Instant};

use axum::http::StatusCode;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use jewel_models::DiffusionInput;

use crate::error::{ApiError, ApiResult};
use crate::metrics::record_generation;

const PROVIDER: &str = "replicate";

/// Replicate configuration.
#[derive(Debug, Clone)]
pub struct ReplicateConfig {
    pub api_token: String,
    /// API root, e.g. `https://api.replicate.com/v1`
    pub base_url: String,
    pub model_version: String,
    /// Number of status polls before giving up
    pub poll_attempts: u32,
    /// Wait between polls
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ReplicateConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            base_url: "https://api.replicate.com/v1".to_string(),
            model_version: "stability-ai/stable-diffusion-3".to_string(),
            poll_attempts: 15,
            poll_interval: Duration::from_millis(2000),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ReplicateConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_token: std::env::var("REPLICATE_API_TOKEN").unwrap_or_default(),
            base_url: std::env::var("REPLICATE_BASE_URL").unwrap_or(defaults.base_url),
            model_version: std::env::var("REPLICATE_MODEL_VERSION").unwrap_or(defaults.model_version),
            poll_attempts: std::env::var("REPLICATE_POLL_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.poll_attempts),
            poll_interval: std::env::var("REPLICATE_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            timeout: defaults.timeout,
        }
    }
}

/// Prediction lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

/// Prediction resource.
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl Prediction {
    fn has_output(&self) -> bool {
        match &self.output {
            None | Some(Value::Null) => false,
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }

    fn error_details(&self) -> String {
        match &self.error {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Null) | None => "Unknown error".to_string(),
            Some(other) => other.to_string(),
        }
    }
}

#[derive(Serialize)]
struct CreatePrediction<'a> {
    version: &'a str,
    input: &'a DiffusionInput,
}

/// Replicate API client.
pub struct ReplicateClient {
    http: Client,
    config: ReplicateConfig,
}

impl ReplicateClient {
    pub fn new(config: ReplicateConfig) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::internal_with("Failed to build Replicate client", e))?;

        if config.api_token.is_empty() {
            warn!("REPLICATE_API_TOKEN is not set; image generation requests will fail");
        }

        Ok(Self { http, config })
    }

    pub fn from_env() -> ApiResult<Self> {
        Self::new(ReplicateConfig::from_env())
    }

    pub fn config(&self) -> &ReplicateConfig {
        &self.config
    }

    async fn create_prediction(&self, input: &DiffusionInput) -> ApiResult<Prediction> {
        let url = format!("{}/predictions", self.config.base_url.trim_end_matches('/'));
        let body = CreatePrediction {
            version: &self.config.model_version,
            input,
        };
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::internal_with("Error generating images", e))?;
        Self::read_prediction(response).await
    }

    async fn get_prediction(&self, id: &str) -> ApiResult<Prediction> {
        let url = format!("{}/predictions/{}", self.config.base_url.trim_end_matches('/'), id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await
            .map_err(|e| ApiError::internal_with("Error generating images", e))?;
        Self::read_prediction(response).await
    }

    async fn read_prediction(response: reqwest::Response) -> ApiResult<Prediction> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::internal_with(
                "Error generating images",
                format!("Replicate returned {}: {}", status, body),
            ));
        }
        response
            .json::<Prediction>()
            .await
            .map_err(|e| ApiError::internal_with("Error generating images", e))
    }

    /// Run a prediction to completion and return its output.
    pub async fn generate(&self, input: &DiffusionInput) -> ApiResult<Value> {
        let start = Instant::now();
        let result = self.run_prediction(input).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(ApiError::GatewayTimeout(_)) => "timeout",
            Err(_) => "failure",
        };
        record_generation(PROVIDER, outcome, start.elapsed().as_secs_f64());
        result
    }

    async fn run_prediction(&self, input: &DiffusionInput) -> ApiResult<Value> {
        let prediction = self.create_prediction(input).await?;
        info!(prediction_id = %prediction.id, status = ?prediction.status, "Prediction created");

        let attempts = self.config.poll_attempts.max(1);
        for attempt in 1..=attempts {
            let latest = self.get_prediction(&prediction.id).await?;
            debug!(attempt, attempts, status = ?latest.status, "Polled prediction");

            match latest.status {
                PredictionStatus::Succeeded => {
                    if !latest.has_output() {
                        warn!(prediction_id = %latest.id, "Prediction returned no output");
                        return Err(ApiError::upstream(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "No images generated",
                            None,
                        ));
                    }
                    return Ok(latest.output.unwrap_or(Value::Null));
                }
                PredictionStatus::Failed | PredictionStatus::Canceled => {
                    warn!(prediction_id = %latest.id, status = ?latest.status, "Prediction did not succeed");
                    return Err(ApiError::upstream(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Image generation failed",
                        Some(latest.error_details()),
                    ));
                }
                _ => {}
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }

        warn!(prediction_id = %prediction.id, attempts, "Prediction timed out");
        Err(ApiError::GatewayTimeout("Image generation timed out".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(json: &str) -> Prediction {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_output_presence() {
        assert!(!prediction(r#"{"id": "p", "status": "succeeded", "output": []}"#).has_output());
        assert!(!prediction(r#"{"id": "p", "status": "succeeded", "output": null}"#).has_output());
        assert!(!prediction(r#"{"id": "p", "status": "succeeded"}"#).has_output());
        assert!(prediction(r#"{"id": "p", "status": "succeeded", "output": ["https://x/1.png"]}"#).has_output());
    }

    #[test]
    fn test_unknown_status_is_tolerated() {
        assert_eq!(
            prediction(r#"{"id": "p", "status": "queued"}"#).status,
            PredictionStatus::Unknown
        );
    }

    #[test]
    fn test_error_details() {
        assert_eq!(prediction(r#"{"id": "p", "status": "failed"}"#).error_details(), "Unknown error");
        assert_eq!(
            prediction(r#"{"id": "p", "status": "failed", "error": "NSFW content"}"#).error_details(),
            "NSFW content"
        );
    }
}
