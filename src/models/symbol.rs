use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geometry::Point;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum BarcodeFormat {
    Ean13,
    Ean8,
    Code128,
    Code39,
    UpcA,
    UpcE,
    Itf,
    QrCode,
}

impl BarcodeFormat {
    /// The 1D symbologies a retail scanner is tuned for.
    pub const LINEAR: [BarcodeFormat; 7] = [
        BarcodeFormat::Ean13,
        BarcodeFormat::Ean8,
        BarcodeFormat::Code128,
        BarcodeFormat::Code39,
        BarcodeFormat::UpcA,
        BarcodeFormat::UpcE,
        BarcodeFormat::Itf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BarcodeFormat::Ean13 => "EAN-13",
            BarcodeFormat::Ean8 => "EAN-8",
            BarcodeFormat::Code128 => "CODE-128",
            BarcodeFormat::Code39 => "CODE-39",
            BarcodeFormat::UpcA => "UPC-A",
            BarcodeFormat::UpcE => "UPC-E",
            BarcodeFormat::Itf => "ITF",
            BarcodeFormat::QrCode => "QR-CODE",
        }
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One successful decode. `payload` is the identity key for dedup; the
/// other fields never take part in equality of detections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedSymbol {
    pub payload: String,
    pub format: BarcodeFormat,
    /// Anchor points in frame pixel space, 2 (orientation line) to 4 (quad).
    /// Empty when the decoder reported no geometry.
    pub corner_points: Vec<Point>,
    pub captured_at: DateTime<Utc>,
}

impl DecodedSymbol {
    pub fn new(payload: impl Into<String>, format: BarcodeFormat) -> Self {
        Self {
            payload: payload.into(),
            format,
            corner_points: Vec::new(),
            captured_at: Utc::now(),
        }
    }

    pub fn with_corners(mut self, corners: impl IntoIterator<Item = Point>) -> Self {
        self.corner_points = corners.into_iter().collect();
        self
    }

    /// Shift every corner point, used when the decoder only saw a sub-region.
    pub fn translate(&mut self, dx: f32, dy: f32) {
        for point in &mut self.corner_points {
            *point = point.translated(dx, dy);
        }
    }
}
