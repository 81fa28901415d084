//! Admin user management.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use jewel_models::{UserRole, UserSummary};
use jewel_supabase::SupabaseUser;

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ListUsersResponse {
    pub users: Vec<UserSummary>,
}

/// List all users.
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> ApiResult<Json<ListUsersResponse>> {
    let users = state.supabase.list_users().await?;
    Ok(Json(ListUsersResponse {
        users: users.iter().map(SupabaseUser::summary).collect(),
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
}

#[derive(Serialize)]
pub struct CreateUserResponse {
    pub data: SupabaseUser,
}

/// Create a user with a confirmed email.
pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> ApiResult<Json<CreateUserResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(first_validation_message(&e)))?;

    let user = state
        .supabase
        .create_user(request.email.trim(), &request.password, request.role)
        .await?;

    info!(admin_id = %admin.user_id, user_id = %user.id, role = %request.role, "User created");
    Ok(Json(CreateUserResponse { data: user }))
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Delete a user by id.
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.supabase.delete_user(&user_id).await?;

    info!(admin_id = %admin.user_id, user_id = %user_id, "User deleted");
    Ok(Json(MessageResponse {
        message: "User deleted successfully".to_string(),
    }))
}

/// First human-readable message out of a validation failure.
fn first_validation_message(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Invalid request".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_validation() {
        let ok: CreateUserRequest =
            serde_json::from_str(r#"{"email": "new@karishma.in", "password": "secret1"}"#).unwrap();
        assert!(ok.validate().is_ok());
        assert_eq!(ok.role, UserRole::User);

        let short: CreateUserRequest =
            serde_json::from_str(r#"{"email": "new@karishma.in", "password": "abc", "role": "ADMIN"}"#).unwrap();
        let err = short.validate().unwrap_err();
        assert_eq!(first_validation_message(&err), "Password must be at least 6 characters");

        let bad_email: CreateUserRequest =
            serde_json::from_str(r#"{"email": "not-an-email", "password": "secret1"}"#).unwrap();
        assert_eq!(
            first_validation_message(&bad_email.validate().unwrap_err()),
            "Invalid email address"
        );
    }
}
