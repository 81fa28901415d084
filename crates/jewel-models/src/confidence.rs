//! Detection sensitivity sent to the segmentation service.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Confidence threshold in the inclusive range `0.1..=1.0`.
///
/// Lower values make the remote detector more permissive. The value travels
/// as the `confidence` multipart field in its shortest decimal form.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct ConfidenceThreshold(f32);

impl ConfidenceThreshold {
    /// Smallest accepted threshold.
    pub const MIN: f32 = 0.1;
    /// Largest accepted threshold.
    pub const MAX: f32 = 1.0;
    /// Threshold used before the user touches the slider.
    pub const DEFAULT: f32 = 0.5;

    /// Create a threshold, rejecting values outside the range (and NaN).
    pub fn new(value: f32) -> ModelResult<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ModelError::ConfidenceOutOfRange(value))
        }
    }

    /// Map a slider position in percent (`10..=100`) to a threshold.
    pub fn from_slider_percent(percent: u8) -> ModelResult<Self> {
        Self::new(f32::from(percent) / 100.0)
    }

    /// Slider position in percent for this threshold.
    pub fn slider_percent(&self) -> u8 {
        (self.0 * 100.0).round() as u8
    }

    pub fn value(&self) -> f32 {
        self.0
    }

    /// Value as sent in the multipart `confidence` field.
    pub fn to_form_value(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ConfidenceThreshold {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<f32> for ConfidenceThreshold {
    type Error = ModelError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConfidenceThreshold> for f32 {
    fn from(threshold: ConfidenceThreshold) -> Self {
        threshold.0
    }
}

impl FromStr for ConfidenceThreshold {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f32 = s
            .trim()
            .parse()
            .map_err(|_| ModelError::ConfidenceOutOfRange(f32::NAN))?;
        Self::new(value)
    }
}

impl fmt::Display for ConfidenceThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_inclusive() {
        assert!(ConfidenceThreshold::new(0.1).is_ok());
        assert!(ConfidenceThreshold::new(1.0).is_ok());
        assert!(ConfidenceThreshold::new(0.09).is_err());
        assert!(ConfidenceThreshold::new(1.01).is_err());
        assert!(ConfidenceThreshold::new(f32::NAN).is_err());
    }

    #[test]
    fn test_form_value() {
        assert_eq!(ConfidenceThreshold::default().to_form_value(), "0.5");
        assert_eq!(ConfidenceThreshold::new(0.25).unwrap().to_form_value(), "0.25");
    }

    #[test]
    fn test_slider_mapping() {
        let c = ConfidenceThreshold::from_slider_percent(10).unwrap();
        assert_eq!(c.value(), 0.1);
        assert_eq!(c.slider_percent(), 10);
        assert!(ConfidenceThreshold::from_slider_percent(5).is_err());
        assert_eq!(ConfidenceThreshold::from_slider_percent(100).unwrap().value(), 1.0);
    }

    #[test]
    fn test_serde_rejects_out_of_range() {
        let ok: ConfidenceThreshold = serde_json::from_str("0.7").unwrap();
        assert_eq!(ok.value(), 0.7);
        assert!(serde_json::from_str::<ConfidenceThreshold>("0.05").is_err());
    }

    #[test]
    fn test_parse() {
        assert_eq!("0.3".parse::<ConfidenceThreshold>().unwrap().value(), 0.3);
        assert!("abc".parse::<ConfidenceThreshold>().is_err());
    }
}
