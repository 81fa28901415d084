//! Write a segmentation result to disk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use jewel_models::{DataUri, SegmentationResult};

use crate::error::SegmentResult;

const DEFAULT_ARCHIVE_NAME: &str = "components.zip";
const COMPONENTS_DIR: &str = "components";

/// Paths written by [`export_results`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportedFiles {
    pub archive: Option<PathBuf>,
    pub segmented_image: Option<PathBuf>,
    pub components: Vec<PathBuf>,
}

impl ExportedFiles {
    pub fn count(&self) -> usize {
        self.archive.iter().count() + self.segmented_image.iter().count() + self.components.len()
    }
}

/// Save the archive and the annotated image under `dir`, and each category
/// crop under `dir/components/`.
///
/// Labels that sanitize to the same name get `-2`, `-3`, ... suffixes, so
/// every listed path holds its own file. Images given as remote URLs instead
/// of data URIs are skipped. A broken archive payload is an error; a broken
/// crop is logged and skipped.
pub async fn export_results(result: &SegmentationResult, dir: &Path) -> SegmentResult<ExportedFiles> {
    tokio::fs::create_dir_all(dir).await?;
    let mut exported = ExportedFiles::default();
    let mut taken = HashSet::new();

    let archive = result.zip_file.decode()?;
    let archive_name = sanitize_file_name(&result.zip_file.filename)
        .unwrap_or_else(|| DEFAULT_ARCHIVE_NAME.to_string());
    let archive_path = claim_path(dir, &archive_name, &mut taken);
    tokio::fs::write(&archive_path, &archive.data).await?;
    exported.archive = Some(archive_path);

    match decode_image(&result.segmented_image) {
        Some(image) => {
            let name = format!("segmented.{}", image.extension().unwrap_or("png"));
            let path = claim_path(dir, &name, &mut taken);
            tokio::fs::write(&path, &image.data).await?;
            exported.segmented_image = Some(path);
        }
        None => warn!("Annotated image is not an inline data URI, skipping"),
    }

    let components_dir = dir.join(COMPONENTS_DIR);
    for (label, reference) in &result.component_images {
        let Some(stem) = sanitize_file_name(label) else {
            warn!(label = %label, "Unusable category label, skipping");
            continue;
        };
        match decode_image(reference) {
            Some(image) => {
                if exported.components.is_empty() {
                    tokio::fs::create_dir_all(&components_dir).await?;
                }
                let name = format!("{}.{}", stem, image.extension().unwrap_or("png"));
                let path = claim_path(&components_dir, &name, &mut taken);
                tokio::fs::write(&path, &image.data).await?;
                exported.components.push(path);
            }
            None => warn!(label = %label, "Category image is not an inline data URI, skipping"),
        }
    }

    info!(
        dir = %dir.display(),
        files = exported.count(),
        "Exported segmentation results"
    );
    Ok(exported)
}

/// First free `dir/name`, then `dir/<stem>-2.<ext>`, `dir/<stem>-3.<ext>`, ...
fn claim_path(dir: &Path, name: &str, taken: &mut HashSet<PathBuf>) -> PathBuf {
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    let mut candidate = dir.join(name);
    let mut n = 2;
    while taken.contains(&candidate) {
        let file = match ext {
            Some(ext) => format!("{}-{}.{}", stem, n, ext),
            None => format!("{}-{}", stem, n),
        };
        candidate = dir.join(file);
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

fn decode_image(reference: &str) -> Option<DataUri> {
    if !reference.trim_start().starts_with("data:") {
        return None;
    }
    match DataUri::parse(reference) {
        Ok(uri) => Some(uri),
        Err(e) => {
            warn!("Failed to decode inline image: {}", e);
            None
        }
    }
}

/// Keep only the final path component, restricted to a safe character set.
fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
