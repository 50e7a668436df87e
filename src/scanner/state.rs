use serde::{Deserialize, Serialize};

/// Lifecycle of one decode driver. A stopped driver is never reused; a new
/// scan gets a new driver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DriverState {
    Idle,
    Active,
    Stopped,
}

impl Default for DriverState {
    fn default() -> Self {
        DriverState::Idle
    }
}

impl DriverState {
    /// `Idle -> Active`. Returns false from any other state.
    pub fn activate(&mut self) -> bool {
        if *self == DriverState::Idle {
            *self = DriverState::Active;
            true
        } else {
            false
        }
    }

    pub fn stop(&mut self) {
        *self = DriverState::Stopped;
    }

    pub fn is_active(&self) -> bool {
        *self == DriverState::Active
    }
}

/// What the scanner as a whole is doing, as shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ScannerStatus {
    Idle,
    Starting,
    #[serde(rename_all = "camelCase")]
    Scanning { device_id: String },
    Stopped,
    /// A camera failure; scanning needs an explicit retry.
    Disabled { reason: String },
}

impl Default for ScannerStatus {
    fn default() -> Self {
        ScannerStatus::Idle
    }
}

impl ScannerStatus {
    pub fn is_scanning(&self) -> bool {
        matches!(self, ScannerStatus::Scanning { .. })
    }
}
