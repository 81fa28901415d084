//! Current-user profile.

use axum::extract::{Multipart, State};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use jewel_models::{UserContext, UserMetadata};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Context of the calling user.
pub async fn me(user: AuthUser) -> Json<UserContext> {
    Json(user.context())
}

#[derive(Debug, Serialize)]
pub struct UpdateSettingsResponse {
    pub message: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Default)]
struct SettingsForm {
    email: Option<String>,
    name: Option<String>,
    surname: Option<String>,
    avatar_url: Option<String>,
    avatar: Option<AvatarUpload>,
}

#[derive(Debug)]
struct AvatarUpload {
    file_name: Option<String>,
    content_type: String,
    bytes: Vec<u8>,
}

impl AvatarUpload {
    fn extension(&self) -> &str {
        self.file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| match self.content_type.as_str() {
                "image/png" => "png",
                "image/webp" => "webp",
                "image/gif" => "gif",
                _ => "jpg",
            })
    }
}

async fn read_form(mut multipart: Multipart) -> ApiResult<SettingsForm> {
    let mut form = SettingsForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid form data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "avatar" => {
                let file_name = field.file_name().map(|s| s.to_string());
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid form data: {}", e)))?;
                if !bytes.is_empty() {
                    form.avatar = Some(AvatarUpload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            "email" | "name" | "surname" | "avatar_url" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid form data: {}", e)))?;
                let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
                match name.as_str() {
                    "email" => form.email = value,
                    "name" => form.name = value,
                    "surname" => form.surname = value,
                    _ => form.avatar_url = value,
                }
            }
            other => {
                warn!(field = %other, "Ignoring unknown settings field");
            }
        }
    }

    Ok(form)
}

/// Update name, surname, email and profile picture.
pub async fn update_settings(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> ApiResult<Json<UpdateSettingsResponse>> {
    let form = read_form(multipart).await?;
    let mut avatar_url = form.avatar_url;

    if let Some(avatar) = form.avatar {
        let object = format!(
            "{}-{}.{}",
            user.user_id,
            Utc::now().timestamp_millis(),
            avatar.extension()
        );
        let bucket = &state.config.avatar_bucket;

        state
            .supabase
            .upload_object(bucket, &object, avatar.bytes, &avatar.content_type)
            .await
            .map_err(|e| ApiError::internal_with("Failed to upload avatar", e))?;

        avatar_url = Some(state.supabase.public_url(bucket, &object));
        info!(user_id = %user.user_id, object = %object, "Avatar uploaded");
    }

    let metadata = UserMetadata {
        role: None,
        name: form.name,
        surname: form.surname,
        avatar_url: avatar_url.clone(),
    };
    state
        .supabase
        .update_user(&user.user_id, form.email.as_deref(), &metadata)
        .await?;

    info!(user_id = %user.user_id, "Profile updated");
    Ok(Json(UpdateSettingsResponse {
        message: "Profile updated successfully".to_string(),
        avatar_url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn avatar(file_name: Option<&str>, content_type: &str) -> AvatarUpload {
        AvatarUpload {
            file_name: file_name.map(str::to_string),
            content_type: content_type.to_string(),
            bytes: vec![1],
        }
    }

    #[test]
    fn test_avatar_extension() {
        assert_eq!(avatar(Some("me.PNG"), "image/png").extension(), "PNG");
        assert_eq!(avatar(Some("me"), "image/png").extension(), "png");
        assert_eq!(avatar(None, "image/jpeg").extension(), "jpg");
        assert_eq!(avatar(Some("../../x.j/pg"), "image/webp").extension(), "webp");
    }
}
