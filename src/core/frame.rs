use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Encoded still frame, carried as a data URL exactly as the backend expects
/// it in `image_base64`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedFrame(String);

impl EncodedFrame {
    /// Wraps an already encoded frame (data URL or bare base64).
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn from_jpeg(bytes: &[u8]) -> Self {
        Self(format!("{}{}", JPEG_DATA_URL_PREFIX, STANDARD.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_jpeg_builds_data_url() {
        let frame = EncodedFrame::from_jpeg(&[0xff, 0xd8, 0xff]);
        assert_eq!(frame.as_str(), "data:image/jpeg;base64,/9j/");
    }
}
