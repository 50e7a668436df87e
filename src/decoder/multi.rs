use std::collections::HashSet;

use image::RgbaImage;
use rxing::{
    BarcodeFormat as RxFormat, DecodeHintType, DecodeHintValue, DecodingHintDictionary,
    Exceptions,
};

use super::{DecodeHints, SymbolDecoder};
use crate::error::DecodeError;
use crate::geometry::Point;
use crate::models::{BarcodeFormat, DecodedSymbol};

/// 1D and QR decoding through rxing's multi-format reader.
#[derive(Debug, Default, Clone, Copy)]
pub struct MultiFormatDecoder;

impl MultiFormatDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl SymbolDecoder for MultiFormatDecoder {
    fn name(&self) -> &str {
        "rxing"
    }

    fn decode(
        &self,
        frame: &RgbaImage,
        hints: &DecodeHints,
    ) -> Result<Option<DecodedSymbol>, DecodeError> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::UnsupportedFrame { width, height });
        }

        let luma = image::imageops::grayscale(frame).into_raw();
        let mut dictionary = hint_dictionary(hints);
        let detected =
            rxing::helpers::detect_in_luma_with_hints(luma, width, height, None, &mut dictionary);
        match detected {
            Ok(result) => {
                let Some(format) = from_rxing(result.getBarcodeFormat()) else {
                    return Ok(None);
                };
                let corners = result.getPoints().iter().map(|p| Point::new(p.x, p.y));
                Ok(Some(
                    DecodedSymbol::new(result.getText(), format).with_corners(corners),
                ))
            }
            Err(Exceptions::NotFoundException(_)) => Ok(None),
            Err(err) => Err(DecodeError::Failed(err.to_string())),
        }
    }
}

/// Translate our hints into rxing's dictionary. An empty format list leaves
/// the reader free to try everything it knows.
pub fn hint_dictionary(hints: &DecodeHints) -> DecodingHintDictionary {
    let mut dictionary = DecodingHintDictionary::new();
    dictionary.insert(
        DecodeHintType::TRY_HARDER,
        DecodeHintValue::TryHarder(hints.try_harder),
    );
    dictionary.insert(
        DecodeHintType::ALSO_INVERTED,
        DecodeHintValue::AlsoInverted(hints.invert_image),
    );
    if !hints.character_set.is_empty() {
        dictionary.insert(
            DecodeHintType::CHARACTER_SET,
            DecodeHintValue::CharacterSet(hints.character_set.clone()),
        );
    }

    let formats: HashSet<RxFormat> = hints.formats.iter().map(|f| to_rxing(*f)).collect();
    if !formats.is_empty() {
        dictionary.insert(
            DecodeHintType::POSSIBLE_FORMATS,
            DecodeHintValue::PossibleFormats(formats),
        );
    }
    dictionary
}

pub fn to_rxing(format: BarcodeFormat) -> RxFormat {
    match format {
        BarcodeFormat::Ean13 => RxFormat::EAN_13,
        BarcodeFormat::Ean8 => RxFormat::EAN_8,
        BarcodeFormat::Code128 => RxFormat::CODE_128,
        BarcodeFormat::Code39 => RxFormat::CODE_39,
        BarcodeFormat::UpcA => RxFormat::UPC_A,
        BarcodeFormat::UpcE => RxFormat::UPC_E,
        BarcodeFormat::Itf => RxFormat::ITF,
        BarcodeFormat::QrCode => RxFormat::QR_CODE,
    }
}

/// `None` for symbologies this scanner does not report.
pub fn from_rxing(format: &RxFormat) -> Option<BarcodeFormat> {
    match format {
        RxFormat::EAN_13 => Some(BarcodeFormat::Ean13),
        RxFormat::EAN_8 => Some(BarcodeFormat::Ean8),
        RxFormat::CODE_128 => Some(BarcodeFormat::Code128),
        RxFormat::CODE_39 => Some(BarcodeFormat::Code39),
        RxFormat::UPC_A => Some(BarcodeFormat::UpcA),
        RxFormat::UPC_E => Some(BarcodeFormat::UpcE),
        RxFormat::ITF => Some(BarcodeFormat::Itf),
        RxFormat::QR_CODE => Some(BarcodeFormat::QrCode),
        _ => None,
    }
}
