//! `data:` URI encoding and decoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{ModelError, ModelResult};

/// Decoded `data:<media-type>;base64,<payload>` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub media_type: String,
    pub data: Vec<u8>,
}

impl DataUri {
    /// Parse a base64 data URI.
    pub fn parse(uri: &str) -> ModelResult<Self> {
        let rest = uri
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| ModelError::InvalidDataUri("missing data: prefix".to_string()))?;

        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ModelError::InvalidDataUri("missing payload separator".to_string()))?;

        let media_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| ModelError::InvalidDataUri("only base64 payloads are supported".to_string()))?;

        let data = STANDARD
            .decode(payload.trim())
            .map_err(|e| ModelError::InvalidDataUri(e.to_string()))?;

        Ok(Self {
            media_type: if media_type.is_empty() {
                "application/octet-stream".to_string()
            } else {
                media_type.to_string()
            },
            data,
        })
    }

    /// Decode either a full data URI or a bare base64 payload.
    pub fn decode_lenient(value: &str, fallback_type: &str) -> ModelResult<Self> {
        if value.trim_start().starts_with("data:") {
            return Self::parse(value);
        }
        let data = STANDARD
            .decode(value.trim())
            .map_err(|e| ModelError::InvalidDataUri(e.to_string()))?;
        Ok(Self {
            media_type: fallback_type.to_string(),
            data,
        })
    }

    /// Render bytes as a data URI.
    pub fn encode(media_type: &str, data: &[u8]) -> String {
        format!("data:{};base64,{}", media_type, STANDARD.encode(data))
    }

    /// File extension matching the media type, if it is a known image/archive type.
    pub fn extension(&self) -> Option<&'static str> {
        match self.media_type.as_str() {
            "image/jpeg" | "image/jpg" => Some("jpg"),
            "image/png" => Some("png"),
            "image/webp" => Some("webp"),
            "application/zip" | "application/x-zip-compressed" => Some("zip"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_png() {
        let uri = DataUri::parse("data:image/png;base64,AQID").unwrap();
        assert_eq!(uri.media_type, "image/png");
        assert_eq!(uri.data, vec![1, 2, 3]);
        assert_eq!(uri.extension(), Some("png"));
    }

    #[test]
    fn test_encode_matches_parse() {
        let encoded = DataUri::encode("image/jpeg", b"jewel");
        assert!(encoded.starts_with("data:image/jpeg;base64,"));
        assert_eq!(DataUri::parse(&encoded).unwrap().data, b"jewel");
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(DataUri::parse("image/png;base64,AQID").is_err());
        assert!(DataUri::parse("data:image/png,plain").is_err());
        assert!(DataUri::parse("data:image/png;base64").is_err());
        assert!(DataUri::parse("data:image/png;base64,***").is_err());
    }

    #[test]
    fn test_lenient_accepts_bare_payload() {
        let uri = DataUri::decode_lenient("UEsDBA==", "application/zip").unwrap();
        assert_eq!(uri.media_type, "application/zip");
        assert_eq!(uri.data, vec![0x50, 0x4b, 0x03, 0x04]);
    }
}
