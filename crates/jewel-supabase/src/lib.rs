//! Supabase REST client.
//!
//! This crate provides:
//! - Auth admin operations (list, create, update, delete users)
//! - Storage uploads and public URLs
//! - Service-role authentication and status-code error mapping
//! - Observability (tracing spans, metrics)

pub mod client;
pub mod error;
pub mod metrics;
pub mod types;

pub use client::{SupabaseClient, SupabaseConfig};
pub use error::{SupabaseError, SupabaseResult};
pub use types::SupabaseUser;
