use image::{GrayImage, RgbaImage};

use super::{DecodeHints, SymbolDecoder};
use crate::error::DecodeError;
use crate::geometry::Point;
use crate::models::{BarcodeFormat, DecodedSymbol};

/// QR decoding on the luma plane through rqrr.
#[derive(Debug, Default, Clone, Copy)]
pub struct QrDecoder;

impl QrDecoder {
    pub fn new() -> Self {
        Self
    }

    fn scan(luma: &GrayImage) -> Result<Option<DecodedSymbol>, DecodeError> {
        let width = luma.width() as usize;
        let height = luma.height() as usize;
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            luma.get_pixel(x as u32, y as u32)[0]
        });

        let grids = prepared.detect_grids();
        if grids.is_empty() {
            return Ok(None);
        }

        let mut last_err = None;
        for grid in grids {
            match grid.decode() {
                Ok((_, content)) => {
                    let corners = grid
                        .bounds
                        .iter()
                        .map(|p| Point::new(p.x as f32, p.y as f32));
                    return Ok(Some(
                        DecodedSymbol::new(content, BarcodeFormat::QrCode).with_corners(corners),
                    ));
                }
                Err(err) => last_err = Some(format!("{err:?}")),
            }
        }

        // A grid was located but its content did not survive error correction.
        Err(DecodeError::Failed(
            last_err.unwrap_or_else(|| "unreadable QR grid".into()),
        ))
    }
}

impl SymbolDecoder for QrDecoder {
    fn name(&self) -> &str {
        "rqrr"
    }

    fn decode(
        &self,
        frame: &RgbaImage,
        hints: &DecodeHints,
    ) -> Result<Option<DecodedSymbol>, DecodeError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(DecodeError::UnsupportedFrame {
                width: frame.width(),
                height: frame.height(),
            });
        }
        if !hints.accepts(BarcodeFormat::QrCode) {
            return Ok(None);
        }

        let mut luma = image::imageops::grayscale(frame);
        if hints.invert_image {
            image::imageops::invert(&mut luma);
            return Self::scan(&luma);
        }

        match Self::scan(&luma)? {
            Some(symbol) => Ok(Some(symbol)),
            None if hints.try_harder => {
                image::imageops::invert(&mut luma);
                Self::scan(&luma)
            }
            None => Ok(None),
        }
    }
}
