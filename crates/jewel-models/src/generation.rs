//! Request types for the generative-image features.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ModelError, ModelResult};

/// Prompt used when the caller does not send one.
pub const DEFAULT_VARIATION_PROMPT: &str = "Generate different style variations of this necklace while keeping its original design intact. Maintain the same structure, shape, and overall look, but explore subtle variations in materials, textures, patterns, and artistic details. Experiment with different metal finishes, gemstone settings, engravings, or cultural influences, but do not alter the core design significantly.";

/// Image reference accepted by the generation routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Absolute URL the server may fetch.
    Url(Url),
    /// Inline `data:` URI.
    Inline(String),
}

impl ImageSource {
    /// Accept an absolute URL or a `data:` URI.
    pub fn parse(value: &str) -> ModelResult<Self> {
        if value.starts_with("data:") {
            return Ok(ImageSource::Inline(value.to_string()));
        }
        Url::parse(value)
            .map(ImageSource::Url)
            .map_err(|_| ModelError::InvalidImageSource)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ImageSource::Url(url) => url.as_str(),
            ImageSource::Inline(uri) => uri,
        }
    }
}

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

impl GenerateRequest {
    pub fn prompt_or_default(&self) -> &str {
        self.prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_VARIATION_PROMPT)
    }
}

/// Body of `POST /api/generate-clipdrop`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReimagineRequest {
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Input block of a diffusion prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffusionInput {
    pub image: String,
    pub prompt: String,
    pub num_outputs: u32,
    pub num_inference_steps: u32,
    pub scheduler: String,
    pub width: u32,
    pub height: u32,
    pub guidance_scale: f32,
}

impl DiffusionInput {
    pub fn new(image: &ImageSource, prompt: &str) -> Self {
        Self {
            image: image.as_str().to_string(),
            prompt: prompt.to_string(),
            num_outputs: 2,
            num_inference_steps: 60,
            scheduler: "DDIM".to_string(),
            width: 512,
            height: 512,
            guidance_scale: 7.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_source_parse() {
        assert!(matches!(ImageSource::parse("https://cdn.example.com/n.jpg"), Ok(ImageSource::Url(_))));
        assert!(matches!(ImageSource::parse("data:image/png;base64,AQID"), Ok(ImageSource::Inline(_))));
        assert_eq!(ImageSource::parse("necklace.jpg"), Err(ModelError::InvalidImageSource));
    }

    #[test]
    fn test_prompt_default() {
        let req: GenerateRequest = serde_json::from_str(r#"{"imageUrl": "https://x/y.png"}"#).unwrap();
        assert_eq!(req.prompt_or_default(), DEFAULT_VARIATION_PROMPT);

        let req: GenerateRequest = serde_json::from_str(r#"{"imageUrl": "https://x/y.png", "prompt": "gold"}"#).unwrap();
        assert_eq!(req.prompt_or_default(), "gold");
    }

    #[test]
    fn test_diffusion_input_constants() {
        let source = ImageSource::parse("https://x/y.png").unwrap();
        let input = DiffusionInput::new(&source, "p");
        assert_eq!(input.num_outputs, 2);
        assert_eq!(input.num_inference_steps, 60);
        assert_eq!(input.scheduler, "DDIM");
        assert_eq!((input.width, input.height), (512, 512));
    }
}
