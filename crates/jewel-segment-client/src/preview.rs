//! Local preview of the selected image.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use jewel_models::AcceptedImage;

/// Renderable local copy of the selected image.
///
/// The backing file is removed when the handle is released or dropped.
#[derive(Debug)]
pub struct PreviewHandle {
    file: NamedTempFile,
}

impl PreviewHandle {
    /// Write the image to a temporary file with the matching extension.
    pub fn create(image: &AcceptedImage) -> std::io::Result<Self> {
        let suffix = format!(".{}", image.kind.extension());
        let mut file = tempfile::Builder::new()
            .prefix("jewel-preview-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(&image.bytes)?;
        file.flush()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Remove the backing file now.
    pub fn release(self) -> std::io::Result<()> {
        self.file.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jewel_models::ImageKind;

    #[test]
    fn test_preview_lifecycle() {
        let image = AcceptedImage {
            file_name: "ring.png".into(),
            kind: ImageKind::Png,
            bytes: vec![9, 8, 7],
        };
        let preview = PreviewHandle::create(&image).unwrap();
        let path = preview.path().to_path_buf();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
        assert_eq!(std::fs::read(&path).unwrap(), vec![9, 8, 7]);

        preview.release().unwrap();
        assert!(!path.exists());
    }
}
