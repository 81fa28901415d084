//! Client for the jewel segmentation service.
//!
//! This crate provides:
//! - A multipart client that sends one image plus a confidence value and
//!   classifies the response
//! - Linear-backoff retry with a fixed attempt ceiling and cancellation
//! - The upload controller that owns one upload session at a time
//! - Export of results (archive, annotated image, category crops) to disk

pub mod client;
pub mod controller;
pub mod decode;
pub mod error;
pub mod export;
pub mod metrics;
pub mod preview;
pub mod retry;

pub use client::{SegmentClient, SegmentClientConfig, Segmenter};
pub use controller::{SessionSnapshot, UploadController};
pub use decode::ErrorBody;
pub use error::{AttemptError, FailureCategory, SegmentError, SegmentResult};
pub use export::{export_results, ExportedFiles};
pub use preview::PreviewHandle;
pub use retry::{run_with_retry, AttemptRecord, RetryOutcome, RetryPolicy};
