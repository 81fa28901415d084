//! Supabase REST client.
//!
//! Talks to the auth admin (`/auth/v1/admin/users`) and storage
//! (`/storage/v1/object`) endpoints with the service-role key. Every call is
//! wrapped in a tracing span and recorded in metrics.

use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, info_span, Instrument};
use url::Url;

use jewel_models::{UserMetadata, UserRole};

use crate::error::{extract_message, SupabaseError, SupabaseResult};
use crate::metrics::record_request;
use crate::types::{CreateUserRequest, SupabaseUser, UpdateUserRequest, UserList};

/// Page size used when listing users.
const USERS_PER_PAGE: usize = 1000;

// =============================================================================
// Configuration
// =============================================================================

/// Supabase client configuration.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Service-role key (admin access, server side only)
    pub service_role_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl SupabaseConfig {
    /// Create config from environment variables.
    pub fn from_env() -> SupabaseResult<Self> {
        let url = std::env::var("SUPABASE_URL")
            .map_err(|_| SupabaseError::config_error("SUPABASE_URL must be set"))?;
        let service_role_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .map_err(|_| SupabaseError::config_error("SUPABASE_SERVICE_ROLE_KEY must be set"))?;

        if service_role_key.is_empty() {
            return Err(SupabaseError::config_error(
                "SUPABASE_SERVICE_ROLE_KEY cannot be empty",
            ));
        }

        Ok(Self {
            url,
            service_role_key,
            timeout: Duration::from_secs(
                std::env::var("SUPABASE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            connect_timeout: Duration::from_secs(5),
        })
    }
}

// =============================================================================
// Client
// =============================================================================

/// Supabase REST client authenticated with the service-role key.
#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    config: SupabaseConfig,
    base_url: String,
}

impl SupabaseClient {
    /// Create a new Supabase client.
    pub fn new(config: SupabaseConfig) -> SupabaseResult<Self> {
        let parsed = Url::parse(&config.url)
            .map_err(|e| SupabaseError::config_error(format!("invalid SUPABASE_URL: {}", e)))?;
        let base_url = parsed.as_str().trim_end_matches('/').to_string();

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("jewel-supabase/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SupabaseError::Network)?;

        Ok(Self {
            http,
            config,
            base_url,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> SupabaseResult<Self> {
        Self::new(SupabaseConfig::from_env()?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.service_role_key)
            .bearer_auth(&self.config.service_role_key)
    }

    fn admin_users_url(&self) -> String {
        format!("{}/auth/v1/admin/users", self.base_url)
    }

    fn admin_user_url(&self, user_id: &str) -> String {
        format!("{}/{}", self.admin_users_url(), urlencoding::encode(user_id))
    }

    fn object_path(bucket: &str, path: &str) -> String {
        let path = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}", urlencoding::encode(bucket), path)
    }

    // =========================================================================
    // Auth admin
    // =========================================================================

    /// List every user, following pages until a short page is returned.
    pub async fn list_users(&self) -> SupabaseResult<Vec<SupabaseUser>> {
        self.execute_request("list_users", async {
            let mut users = Vec::new();
            let mut page = 1u32;
            loop {
                let response = self
                    .authed(self.http.get(self.admin_users_url()))
                    .query(&[("page", page.to_string()), ("per_page", USERS_PER_PAGE.to_string())])
                    .send()
                    .await?;
                let list: UserList = Self::json_or_error(response).await?;
                let fetched = list.users.len();
                users.extend(list.users);
                if fetched < USERS_PER_PAGE {
                    break;
                }
                page += 1;
            }
            debug!(count = users.len(), "Listed users");
            Ok(users)
        })
        .await
    }

    /// Create a user with a confirmed email and the given role.
    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> SupabaseResult<SupabaseUser> {
        let body = CreateUserRequest {
            email,
            password,
            email_confirm: true,
            user_metadata: UserMetadata {
                role: Some(role),
                ..Default::default()
            },
        };

        self.execute_request("create_user", async {
            let response = self
                .authed(self.http.post(self.admin_users_url()))
                .json(&body)
                .send()
                .await?;
            Self::json_or_error(response).await
        })
        .await
    }

    /// Update a user's email and metadata. Metadata keys are merged by Supabase.
    pub async fn update_user(
        &self,
        user_id: &str,
        email: Option<&str>,
        metadata: &UserMetadata,
    ) -> SupabaseResult<SupabaseUser> {
        let body = UpdateUserRequest {
            email: email.filter(|e| !e.is_empty()),
            user_metadata: metadata,
        };

        self.execute_request("update_user", async {
            let response = self
                .authed(self.http.put(self.admin_user_url(user_id)))
                .json(&body)
                .send()
                .await?;
            Self::json_or_error(response).await
        })
        .await
    }

    pub async fn delete_user(&self, user_id: &str) -> SupabaseResult<()> {
        self.execute_request("delete_user", async {
            let response = self
                .authed(self.http.delete(self.admin_user_url(user_id)))
                .send()
                .await?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(Self::error_from_response(response).await)
            }
        })
        .await
    }

    /// Find a user by email (case-insensitive).
    pub async fn find_user_by_email(&self, email: &str) -> SupabaseResult<Option<SupabaseUser>> {
        let users = self.list_users().await?;
        Ok(users.into_iter().find(|u| u.has_email(email)))
    }

    // =========================================================================
    // Storage
    // =========================================================================

    /// Upload an object. Fails if the object already exists.
    pub async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> SupabaseResult<()> {
        let url = format!("{}/storage/v1/object/{}", self.base_url, Self::object_path(bucket, path));

        self.execute_request("upload_object", async {
            let response = self
                .authed(self.http.post(&url))
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .header("x-upsert", "false")
                .body(bytes)
                .send()
                .await?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(Self::error_from_response(response).await)
            }
        })
        .await
    }

    /// Public URL of an object in a public bucket.
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}",
            self.base_url,
            Self::object_path(bucket, path)
        )
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn execute_request<T, F>(&self, operation: &str, fut: F) -> SupabaseResult<T>
    where
        F: std::future::Future<Output = SupabaseResult<T>>,
    {
        let span = info_span!("supabase_request", operation = %operation);

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn json_or_error<T: serde::de::DeserializeOwned>(response: Response) -> SupabaseResult<T> {
        if response.status().is_success() {
            let bytes = response.bytes().await?;
            Ok(serde_json::from_slice(&bytes)?)
        } else {
            Err(Self::error_from_response(response).await)
        }
    }

    async fn error_from_response(response: Response) -> SupabaseError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = extract_message(&body);
        let message = if message.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            message
        };
        SupabaseError::from_http_status(status.as_u16(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SupabaseConfig {
        SupabaseConfig {
            url: "https://demo.supabase.co/".to_string(),
            service_role_key: "service-key".to_string(),
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_public_url() {
        let client = SupabaseClient::new(test_config()).unwrap();
        assert_eq!(
            client.public_url("avatars", "u1-1700000000000.png"),
            "https://demo.supabase.co/storage/v1/object/public/avatars/u1-1700000000000.png"
        );
    }

    #[test]
    fn test_object_path_encodes_segments() {
        assert_eq!(
            SupabaseClient::object_path("avatars", "dir/my file.png"),
            "avatars/dir/my%20file.png"
        );
    }

    #[test]
    fn test_rejects_invalid_url() {
        let config = SupabaseConfig {
            url: "::nope".to_string(),
            ..test_config()
        };
        assert!(matches!(SupabaseClient::new(config), Err(SupabaseError::Config(_))));
    }
}
