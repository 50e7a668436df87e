use thiserror::Error;

/// Failures a scanning session can surface to its user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("camera access failed: {0}")]
    Acquisition(String),
    #[error("camera did not respond within {timeout_ms} ms")]
    AcquisitionTimeout { timeout_ms: u64 },
    #[error("camera start was cancelled")]
    AcquisitionCancelled,
    #[error("no video input devices available")]
    NoDevices,
    #[error("switching to camera {device_id} failed: {reason}")]
    DeviceSwitch { device_id: String, reason: String },
    #[error("decode attempt failed: {0}")]
    Decode(String),
    #[error("snapshot crop failed: {0}")]
    Crop(String),
}

impl ScanError {
    /// Fatal errors end or prevent the session; the rest are logged and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScanError::Acquisition(_)
                | ScanError::AcquisitionTimeout { .. }
                | ScanError::AcquisitionCancelled
                | ScanError::NoDevices
                | ScanError::DeviceSwitch { .. }
        )
    }
}

/// Decoder-side failure other than "no symbol in this frame".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame {width}x{height} cannot be decoded")]
    UnsupportedFrame { width: u32, height: u32 },
    #[error("{0}")]
    Failed(String),
}

impl From<DecodeError> for ScanError {
    fn from(err: DecodeError) -> Self {
        ScanError::Decode(err.to_string())
    }
}
