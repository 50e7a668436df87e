pub mod record;
pub mod symbol;

pub use record::{CroppedImage, ResultRecord};
pub use symbol::{BarcodeFormat, DecodedSymbol};
