//! Outbound provider clients.

pub mod clipdrop;
pub mod replicate;

pub use clipdrop::{ClipDropClient, ClipDropConfig};
pub use replicate::{ReplicateClient, ReplicateConfig};
