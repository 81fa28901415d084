//! Generative-image handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use jewel_models::{DiffusionInput, GenerateRequest, ImageSource, ReimagineRequest};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::state::AppState;

#[derive(Serialize)]
pub struct GenerateResponse {
    pub result: Value,
}

#[derive(Serialize)]
pub struct ReimagineResponse {
    pub result: String,
    pub success: bool,
}

/// Validate the `imageUrl` field shared by both generation routes.
fn image_source(image_url: Option<&str>) -> ApiResult<ImageSource> {
    let raw = image_url
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("No image URL or data provided"))?;
    ImageSource::parse(raw).map_err(|e| ApiError::bad_request(e.to_string()))
}

/// Generate style variations of a piece.
pub async fn generate(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<GenerateRequest>,
) -> ApiResult<Json<GenerateResponse>> {
    let source = image_source(request.image_url.as_deref())?;
    let input = DiffusionInput::new(&source, request.prompt_or_default());

    info!(user_id = %user.user_id, "Generating variations");
    let output = state.replicate.generate(&input).await?;

    Ok(Json(GenerateResponse { result: output }))
}

/// Reimagine a piece.
pub async fn generate_clipdrop(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<ReimagineRequest>,
) -> ApiResult<Json<ReimagineResponse>> {
    let source = image_source(request.image_url.as_deref())?;

    info!(user_id = %user.user_id, "Reimagining image");
    let image = state.clipdrop.reimagine(&source).await?;

    Ok(Json(ReimagineResponse {
        result: image.to_data_uri(),
        success: true,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_source_validation() {
        assert!(matches!(image_source(None), Err(ApiError::BadRequest(m)) if m == "No image URL or data provided"));
        assert!(matches!(image_source(Some("  ")), Err(ApiError::BadRequest(_))));
        assert!(matches!(image_source(Some("necklace.jpg")), Err(ApiError::BadRequest(m)) if m == "Invalid image URL or base64 data"));
        assert!(image_source(Some("data:image/png;base64,AQID")).is_ok());
    }
}
