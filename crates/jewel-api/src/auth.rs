//! Supabase access token authentication.
//!
//! Access tokens are HS256 JWTs signed with the project's JWT secret, so
//! they are verified locally without a round trip to the auth server.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use jewel_models::{UserContext, UserMetadata};

use crate::error::ApiError;
use crate::state::AppState;

/// Audience Supabase puts on tokens of signed-in users.
const AUTHENTICATED_AUDIENCE: &str = "authenticated";

/// Decoded Supabase access token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseClaims {
    /// User ID
    pub sub: String,
    /// Email (if available)
    #[serde(default)]
    pub email: Option<String>,
    /// Expiration
    pub exp: i64,
    /// Postgres role (`authenticated`)
    #[serde(default)]
    pub role: Option<String>,
    /// Profile and application role
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Verifies access tokens with the shared JWT secret.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[AUTHENTICATED_AUDIENCE]);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Create from `SUPABASE_JWT_SECRET`.
    pub fn from_env() -> Result<Self, ApiError> {
        let secret = std::env::var("SUPABASE_JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::internal("SUPABASE_JWT_SECRET must be set"))?;
        Ok(Self::new(&secret))
    }

    /// Verify a Supabase access token.
    pub fn verify_token(&self, token: &str) -> Result<SupabaseClaims, ApiError> {
        decode::<SupabaseClaims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Token validation failed: {}", e);
                ApiError::unauthorized("Unauthorized: Please log in to use this feature")
            })
    }
}

/// Authenticated user extracted from request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
    pub metadata: UserMetadata,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.metadata.role().is_admin()
    }

    /// Whether `email` is this user's own address (case-insensitive).
    pub fn owns_email(&self, email: &str) -> bool {
        self.email
            .as_deref()
            .is_some_and(|own| own.eq_ignore_ascii_case(email.trim()))
    }

    pub fn context(&self) -> UserContext {
        UserContext::signed_in(self.user_id.clone(), self.email.clone(), &self.metadata)
    }
}

impl From<SupabaseClaims> for AuthUser {
    fn from(claims: SupabaseClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            metadata: claims.user_metadata,
        }
    }
}

/// Axum extractor for authenticated user.
#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;

        let claims = state.jwt.verify_token(token.trim())?;

        Ok(AuthUser::from(claims))
    }
}

/// Authenticated user whose metadata role is `ADMIN`.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::forbidden("Unauthorized - Admin access required"));
        }
        Ok(AdminUser(user))
    }
}
