use chrono::{DateTime, Utc};
use image::RgbaImage;
use std::sync::Arc;

use crate::geometry::PixelRect;

/// A snapshot of the video stream. Cloning shares the pixel buffer.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: Arc<RgbaImage>,
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(image: Arc<RgbaImage>, sequence: u64) -> Self {
        Self {
            image,
            sequence,
            captured_at: Utc::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Window left after trimming `margin` pixels off every side.
    /// Falls back to the whole frame when the margin would leave nothing.
    pub fn center_window(&self, margin: u32) -> PixelRect {
        let (w, h) = (self.width(), self.height());
        if margin.saturating_mul(2) >= w || margin.saturating_mul(2) >= h {
            return PixelRect {
                x: 0,
                y: 0,
                width: w,
                height: h,
            };
        }
        PixelRect {
            x: margin,
            y: margin,
            width: w - 2 * margin,
            height: h - 2 * margin,
        }
    }

    /// Copy out a sub-image. The window must lie inside the frame.
    pub fn extract(&self, window: PixelRect) -> RgbaImage {
        image::imageops::crop_imm(
            self.image.as_ref(),
            window.x,
            window.y,
            window.width,
            window.height,
        )
        .to_image()
    }
}
