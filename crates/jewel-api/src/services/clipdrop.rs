//! ClipDrop reimagine client.

use std::io::Cursor;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use image::{DynamicImage, ImageFormat, ImageOutputFormat};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{info, warn};

use jewel_models::{DataUri, ImageSource};

use crate::error::{ApiError, ApiResult};
use crate::metrics::record_generation;

const PROVIDER: &str = "clipdrop";

/// ClipDrop configuration.
#[derive(Debug, Clone)]
pub struct ClipDropConfig {
    pub api_key: String,
    /// Reimagine endpoint
    pub url: String,
    /// Longest side sent to the provider; larger images are downscaled
    pub max_dimension: u32,
    pub timeout: Duration,
}

impl Default for ClipDropConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: "https://clipdrop-api.co/reimagine/v1/reimagine".to_string(),
            max_dimension: 1024,
            timeout: Duration::from_secs(60),
        }
    }
}

impl ClipDropConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("CLIPDROP_API_KEY").unwrap_or_default(),
            url: std::env::var("CLIPDROP_URL").unwrap_or(defaults.url),
            max_dimension: std::env::var("CLIPDROP_MAX_DIMENSION")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_dimension),
            timeout: defaults.timeout,
        }
    }
}

/// Image bytes ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Reimagined image returned by the provider.
#[derive(Debug, Clone)]
pub struct ReimaginedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl ReimaginedImage {
    pub fn to_data_uri(&self) -> String {
        DataUri::encode(&self.mime, &self.bytes)
    }
}

/// ClipDrop API client.
pub struct ClipDropClient {
    http: Client,
    config: ClipDropConfig,
}

impl ClipDropClient {
    pub fn new(config: ClipDropConfig) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::internal_with("Failed to build ClipDrop client", e))?;

        if config.api_key.is_empty() {
            warn!("CLIPDROP_API_KEY is not set; reimagine requests will fail");
        }

        Ok(Self { http, config })
    }

    pub fn from_env() -> ApiResult<Self> {
        Self::new(ClipDropConfig::from_env())
    }

    /// Resolve an image source to raw bytes.
    pub async fn load_image(&self, source: &ImageSource) -> ApiResult<SourceImage> {
        match source {
            ImageSource::Inline(uri) => {
                let decoded = DataUri::parse(uri)
                    .map_err(|_| ApiError::bad_request("Invalid image URL or base64 data"))?;
                Ok(SourceImage {
                    bytes: decoded.data,
                    mime: decoded.media_type,
                })
            }
            ImageSource::Url(url) => {
                let response = self
                    .http
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|e| ApiError::internal_with("Error reimagining image", format!("Failed to fetch image: {}", e)))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(ApiError::internal_with(
                        "Error reimagining image",
                        format!("Failed to fetch image: {}", status),
                    ));
                }

                let mime = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "image/jpeg".to_string());
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| ApiError::internal_with("Error reimagining image", format!("Failed to fetch image: {}", e)))?;

                Ok(SourceImage {
                    bytes: bytes.to_vec(),
                    mime,
                })
            }
        }
    }

    /// Send an image to the reimagine endpoint.
    pub async fn reimagine(&self, source: &ImageSource) -> ApiResult<ReimaginedImage> {
        let start = Instant::now();
        let result = self.run_reimagine(source).await;
        let outcome = if result.is_ok() { "success" } else { "failure" };
        record_generation(PROVIDER, outcome, start.elapsed().as_secs_f64());
        result
    }

    async fn run_reimagine(&self, source: &ImageSource) -> ApiResult<ReimaginedImage> {
        let image = self.load_image(source).await?;
        let image = fit_within(image, self.config.max_dimension)?;

        let part = Part::bytes(image.bytes)
            .file_name("image.jpg")
            .mime_str(&image.mime)
            .map_err(|e| ApiError::internal_with("Error reimagining image", e))?;
        let form = Form::new().part("image_file", part);

        let response = self
            .http
            .post(&self.config.url)
            .header("x-api-key", &self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::internal_with("Error reimagining image", e))?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("Unknown").to_string();
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, "ClipDrop request failed");
            let status = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            return Err(ApiError::upstream(
                status,
                "Image reimagining failed",
                Some(format!("{}: {}", reason, text)),
            ));
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::internal_with("Error reimagining image", e))?;

        info!(size = bytes.len(), "Image reimagined");
        Ok(ReimaginedImage {
            bytes: bytes.to_vec(),
            mime,
        })
    }
}

/// Downscale an image so neither side exceeds `max_dimension`.
///
/// Images already within bounds are passed through untouched. PNG input is
/// re-encoded as PNG, everything else as JPEG.
pub fn fit_within(image: SourceImage, max_dimension: u32) -> ApiResult<SourceImage> {
    let decoded = image::load_from_memory(&image.bytes)
        .map_err(|e| ApiError::bad_request(format!("Unsupported image: {}", e)))?;

    if decoded.width() <= max_dimension && decoded.height() <= max_dimension {
        return Ok(image);
    }

    let resized = decoded.resize(max_dimension, max_dimension, image::imageops::FilterType::Lanczos3);
    let is_png = matches!(image::guess_format(&image.bytes), Ok(ImageFormat::Png));

    let mut buffer = Cursor::new(Vec::new());
    let (encoded, format, mime) = if is_png {
        (resized, ImageOutputFormat::Png, "image/png")
    } else {
        (
            DynamicImage::ImageRgb8(resized.to_rgb8()),
            ImageOutputFormat::Jpeg(90),
            "image/jpeg",
        )
    };
    encoded
        .write_to(&mut buffer, format)
        .map_err(|e| ApiError::internal_with("Error reimagining image", e))?;

    Ok(SourceImage {
        bytes: buffer.into_inner(),
        mime: mime.to_string(),
    })
}
