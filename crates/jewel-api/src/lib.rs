//! Axum HTTP API server.
//!
//! This crate provides:
//! - Supabase access token verification and the per-request user context
//! - Admin user management, account deletion and profile settings
//! - Generative-image routes (diffusion variations, reimagine)
//! - Rate limiting, security headers and Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{ClipDropClient, ClipDropConfig, ReplicateClient, ReplicateConfig};
pub use state::AppState;
