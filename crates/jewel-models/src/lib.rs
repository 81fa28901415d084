//! Shared data models for the jewellery inventory backend.
//!
//! This crate provides Serde-serializable types for:
//! - Upload files and their validation
//! - The confidence threshold sent to the segmentation service
//! - Segmentation results (annotated image, per-category counts, archive)
//! - Upload session status
//! - Users, roles and the per-request user context
//! - Generative-image request types

pub mod confidence;
pub mod data_uri;
pub mod error;
pub mod generation;
pub mod segmentation;
pub mod session;
pub mod upload;
pub mod user;

// Re-export common types
pub use confidence::ConfidenceThreshold;
pub use data_uri::DataUri;
pub use error::{ModelError, ModelResult};
pub use generation::{DiffusionInput, GenerateRequest, ImageSource, ReimagineRequest};
pub use segmentation::{Analysis, ComponentSummary, SegmentationResult, ZipArchive};
pub use session::SessionStatus;
pub use upload::{validate_upload, AcceptedImage, ImageFile, ImageKind, UploadRejection};
pub use user::{UserContext, UserMetadata, UserRole, UserSummary};
