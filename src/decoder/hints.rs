use serde::{Deserialize, Serialize};

use crate::models::BarcodeFormat;

/// Tuning passed to the decoder on every attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DecodeHints {
    /// Symbologies to look for. Empty means "anything the decoder knows".
    pub formats: Vec<BarcodeFormat>,
    pub try_harder: bool,
    /// Also look for light-on-dark symbols.
    pub invert_image: bool,
    pub character_set: String,
}

impl Default for DecodeHints {
    fn default() -> Self {
        let mut formats = BarcodeFormat::LINEAR.to_vec();
        formats.push(BarcodeFormat::QrCode);
        Self {
            formats,
            try_harder: true,
            invert_image: false,
            character_set: "UTF-8".into(),
        }
    }
}

impl DecodeHints {
    pub fn accepts(&self, format: BarcodeFormat) -> bool {
        self.formats.is_empty() || self.formats.contains(&format)
    }
}
