use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::symbol::{BarcodeFormat, DecodedSymbol};
use crate::geometry::{BoundingRegion, PixelRect};

/// PNG snapshot of the frame around a detection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CroppedImage {
    /// Window of the source frame this crop was taken from.
    pub region: PixelRect,
    #[serde(skip)]
    pub png: Arc<Vec<u8>>,
    pub byte_len: usize,
}

impl CroppedImage {
    pub fn new(region: PixelRect, png: Vec<u8>) -> Self {
        let byte_len = png.len();
        Self {
            region,
            png: Arc::new(png),
            byte_len,
        }
    }
}

/// Entry of the result log. Immutable once built.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub id: String,
    pub payload: String,
    pub format: BarcodeFormat,
    pub captured_at: DateTime<Utc>,
    pub bounding_region: Option<BoundingRegion>,
    pub cropped_image: Option<CroppedImage>,
}

impl ResultRecord {
    pub fn from_symbol(
        symbol: &DecodedSymbol,
        bounding_region: Option<BoundingRegion>,
        cropped_image: Option<CroppedImage>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            payload: symbol.payload.clone(),
            format: symbol.format,
            captured_at: symbol.captured_at,
            bounding_region,
            cropped_image,
        }
    }

    pub fn has_image(&self) -> bool {
        self.cropped_image.is_some()
    }
}
