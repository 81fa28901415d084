//! Upload files and client-side format validation.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A file picked or dropped by the user, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    /// Original file name, used for extension checks and the multipart part.
    pub name: String,
    /// Declared media type (may be empty when the source does not know it).
    pub declared_type: String,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            bytes,
        }
    }

    /// Lowercased extension of the file name, without the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    fn normalized_type(&self) -> String {
        self.declared_type.trim().to_ascii_lowercase()
    }
}

/// Image formats the segmentation service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
        }
    }

    fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/jpeg" | "image/jpg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            _ => None,
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpeg" | "jpg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            _ => None,
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// A file that passed validation and may be sent to the segmentation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedImage {
    pub file_name: String,
    pub kind: ImageKind,
    pub bytes: Vec<u8>,
}

impl AcceptedImage {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Why a selection was refused before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("No file selected.")]
    NoFile,

    #[error("WebP images are not supported. Please upload a JPEG or PNG image.")]
    Webp,

    #[error("Unsupported file type '{0}'. Please upload a JPEG or PNG image.")]
    Unsupported(String),

    #[error("The selected file is empty.")]
    EmptyFile,
}

/// Validate a user selection.
///
/// Only the first file is considered. WebP is refused by declared type or by
/// extension. Otherwise a JPEG/PNG declared type or extension is enough; the
/// declared type decides the outbound MIME type when it is recognized.
pub fn validate_upload(files: Vec<ImageFile>) -> Result<AcceptedImage, UploadRejection> {
    let file = files.into_iter().next().ok_or(UploadRejection::NoFile)?;

    let declared = file.normalized_type();
    let extension = file.extension();

    if declared == "image/webp" || extension.as_deref() == Some("webp") {
        return Err(UploadRejection::Webp);
    }

    let kind = ImageKind::from_mime(&declared)
        .or_else(|| extension.as_deref().and_then(ImageKind::from_extension))
        .ok_or_else(|| {
            let shown = if declared.is_empty() {
                extension.clone().unwrap_or_else(|| file.name.clone())
            } else {
                declared.clone()
            };
            UploadRejection::Unsupported(shown)
        })?;

    if file.bytes.is_empty() {
        return Err(UploadRejection::EmptyFile);
    }

    Ok(AcceptedImage {
        file_name: file.name,
        kind,
        bytes: file.bytes,
    })
}
