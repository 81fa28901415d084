//! Self-service account deletion.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::handlers::users::MessageResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub email: String,
}

/// Delete the account registered under `email`.
///
/// Users may delete their own account; admins may delete any non-admin
/// account.
pub async fn delete_account(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<DeleteAccountRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if !user.is_admin() && !user.owns_email(&request.email) {
        warn!(user_id = %user.user_id, "Account deletion attempted for another user");
        return Err(ApiError::forbidden("Unauthorized"));
    }

    let target = state
        .supabase
        .find_user_by_email(&request.email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if target.role().is_admin() {
        return Err(ApiError::forbidden("Cannot delete admin accounts"));
    }

    state.supabase.delete_user(&target.id).await?;

    info!(user_id = %user.user_id, deleted_id = %target.id, "Account deleted");
    Ok(Json(MessageResponse {
        message: "Account deleted successfully".to_string(),
    }))
}
