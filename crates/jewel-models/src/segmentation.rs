//! Segmentation service response model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data_uri::DataUri;
use crate::error::ModelResult;

/// Detection summary for one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    /// Human readable summary from the service.
    #[serde(default)]
    pub message: String,
    /// Count per category label.
    #[serde(default)]
    pub components: BTreeMap<String, u32>,
}

impl Analysis {
    /// Total number of detected items across categories.
    pub fn total(&self) -> u64 {
        self.components.values().map(|c| u64::from(*c)).sum()
    }
}

/// Downloadable archive with every per-category crop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZipArchive {
    /// Data URI (or bare base64 payload) of the archive.
    pub data: String,
    pub filename: String,
}

impl ZipArchive {
    /// Decode the archive payload.
    pub fn decode(&self) -> ModelResult<DataUri> {
        DataUri::decode_lenient(&self.data, "application/zip")
    }
}

/// Successful response body of the segmentation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationResult {
    pub analysis: Analysis,
    /// Annotated image, usually a data URI.
    pub segmented_image: String,
    /// One image reference per category label.
    #[serde(default)]
    pub component_images: BTreeMap<String, String>,
    pub zip_file: ZipArchive,
}

/// Image and count for one category, as shown next to the annotated image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentSummary {
    pub label: String,
    pub display_label: String,
    pub image: String,
    pub count: u32,
}

impl SegmentationResult {
    /// Join category images with their counts. Missing counts read as zero.
    pub fn component_summaries(&self) -> Vec<ComponentSummary> {
        self.component_images
            .iter()
            .map(|(label, image)| ComponentSummary {
                label: label.clone(),
                display_label: label.replace('_', " "),
                image: image.clone(),
                count: self.analysis.components.get(label).copied().unwrap_or(0),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "analysis": {"message": "Detected 7 components", "components": {"red_stone": 4, "pearl": 3}},
        "segmentedImage": "data:image/png;base64,AQID",
        "componentImages": {"red_stone": "data:image/png;base64,AQ==", "kundan": "data:image/png;base64,Ag=="},
        "zipFile": {"data": "data:application/zip;base64,UEsDBA==", "filename": "components.zip"}
    }"#;

    #[test]
    fn test_deserialize_wire_shape() {
        let result: SegmentationResult = serde_json::from_str(BODY).unwrap();
        assert_eq!(result.analysis.components["red_stone"], 4);
        assert_eq!(result.analysis.total(), 7);
        assert_eq!(result.zip_file.filename, "components.zip");
        assert_eq!(result.zip_file.decode().unwrap().data, vec![0x50, 0x4b, 0x03, 0x04]);
    }

    #[test]
    fn test_component_summaries() {
        let result: SegmentationResult = serde_json::from_str(BODY).unwrap();
        let summaries = result.component_summaries();
        assert_eq!(summaries.len(), 2);
        let kundan = summaries.iter().find(|s| s.label == "kundan").unwrap();
        assert_eq!(kundan.count, 0);
        let red = summaries.iter().find(|s| s.label == "red_stone").unwrap();
        assert_eq!(red.display_label, "red stone");
        assert_eq!(red.count, 4);
    }

    #[test]
    fn test_missing_required_field_fails() {
        assert!(serde_json::from_str::<SegmentationResult>(r#"{"analysis": {}}"#).is_err());
    }
}
