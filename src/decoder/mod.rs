//! Boundary to the barcode decoding engine.
//!
//! The engine itself is external; this module fixes the contract and folds
//! its results into a three-way outcome so "nothing in this frame" never
//! gets confused with a real failure.

pub mod hints;
#[cfg(feature = "multiformat")]
pub mod multi;
#[cfg(feature = "qr")]
pub mod qr;

pub use hints::DecodeHints;
#[cfg(feature = "multiformat")]
pub use multi::MultiFormatDecoder;
#[cfg(feature = "qr")]
pub use qr::QrDecoder;

use image::RgbaImage;

use crate::error::DecodeError;
use crate::models::DecodedSymbol;

/// A single-symbol decoder. Stateless per call, so a failed attempt can be
/// retried on the next frame unchanged.
pub trait SymbolDecoder: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` means the decoder ran and found no symbol.
    fn decode(
        &self,
        frame: &RgbaImage,
        hints: &DecodeHints,
    ) -> Result<Option<DecodedSymbol>, DecodeError>;
}

#[derive(Debug, Clone)]
pub enum DecodeOutcome {
    Found(DecodedSymbol),
    NotFound,
    Error(DecodeError),
}

impl DecodeOutcome {
    /// Fold a raw decoder result, dropping symbols of formats the hints exclude.
    pub fn from_result(
        result: Result<Option<DecodedSymbol>, DecodeError>,
        hints: &DecodeHints,
    ) -> Self {
        match result {
            Ok(Some(symbol)) if hints.accepts(symbol.format) => DecodeOutcome::Found(symbol),
            Ok(_) => DecodeOutcome::NotFound,
            Err(err) => DecodeOutcome::Error(err),
        }
    }
}

/// Decoder that never finds anything. Stands in when no engine is compiled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDecoder;

impl SymbolDecoder for NullDecoder {
    fn name(&self) -> &str {
        "null"
    }

    fn decode(
        &self,
        _frame: &RgbaImage,
        _hints: &DecodeHints,
    ) -> Result<Option<DecodedSymbol>, DecodeError> {
        Ok(None)
    }
}

/// The decoder the binary runs with: the multi-format reader when compiled
/// in, QR-only otherwise.
pub fn default_decoder() -> std::sync::Arc<dyn SymbolDecoder> {
    #[cfg(feature = "multiformat")]
    {
        std::sync::Arc::new(MultiFormatDecoder::new())
    }
    #[cfg(all(feature = "qr", not(feature = "multiformat")))]
    {
        std::sync::Arc::new(QrDecoder::new())
    }
    #[cfg(not(any(feature = "qr", feature = "multiformat")))]
    {
        std::sync::Arc::new(NullDecoder)
    }
}
