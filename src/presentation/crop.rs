use std::io::Cursor;

use image::{DynamicImage, ImageFormat};

use crate::camera::Frame;
use crate::error::ScanError;
use crate::geometry::{padded_crop_region, BoundingRegion};
use crate::models::CroppedImage;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Cut the padded bounding region out of `frame` and encode it as PNG.
pub fn try_crop(
    frame: &Frame,
    region: &BoundingRegion,
    padding: u32,
) -> Result<CroppedImage, ScanError> {
    let window = padded_crop_region(&region.rect(), padding, frame.width(), frame.height())
        .ok_or_else(|| {
            ScanError::Crop(format!(
                "region lies outside the {}x{} frame",
                frame.width(),
                frame.height()
            ))
        })?;

    let sub = frame.extract(window);
    let mut png = Vec::new();
    DynamicImage::ImageRgba8(sub)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|err| ScanError::Crop(err.to_string()))?;

    Ok(CroppedImage::new(window, png))
}

/// Like [`try_crop`], degrading to `None` so the detection still commits text-only.
pub fn crop_snapshot(frame: &Frame, region: &BoundingRegion, padding: u32) -> Option<CroppedImage> {
    match try_crop(frame, region, padding) {
        Ok(cropped) => Some(cropped),
        Err(err) => {
            log_warn!("{err}; keeping text-only result");
            None
        }
    }
}
