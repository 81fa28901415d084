//! Application state.

use std::sync::Arc;

use jewel_supabase::SupabaseClient;

use crate::auth::JwtVerifier;
use crate::config::ApiConfig;
use crate::services::{ClipDropClient, ReplicateClient};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub supabase: Arc<SupabaseClient>,
    pub jwt: Arc<JwtVerifier>,
    pub replicate: Arc<ReplicateClient>,
    pub clipdrop: Arc<ClipDropClient>,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let supabase = SupabaseClient::from_env()?;
        let jwt = JwtVerifier::from_env()?;
        let replicate = ReplicateClient::from_env()?;
        let clipdrop = ClipDropClient::from_env()?;

        Ok(Self {
            config,
            supabase: Arc::new(supabase),
            jwt: Arc::new(jwt),
            replicate: Arc::new(replicate),
            clipdrop: Arc::new(clipdrop),
        })
    }
}
