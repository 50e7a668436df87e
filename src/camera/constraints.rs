use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FacingMode {
    /// Front camera, facing the user.
    User,
    /// Back camera, facing away from the user.
    Environment,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DimensionRange {
    pub min: u32,
    pub ideal: u32,
    pub max: u32,
}

impl DimensionRange {
    pub const fn new(min: u32, ideal: u32, max: u32) -> Self {
        Self { min, ideal, max }
    }

    pub fn contains(&self, value: u32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// What the scanner asks of a camera stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamConstraints {
    pub facing_mode: Option<FacingMode>,
    /// Exact device to open; wins over `facing_mode`.
    pub device_id: Option<String>,
    pub width: DimensionRange,
    pub height: DimensionRange,
    pub continuous_focus: bool,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            facing_mode: Some(FacingMode::Environment),
            device_id: None,
            width: DimensionRange::new(640, 1280, 1920),
            height: DimensionRange::new(480, 720, 1080),
            continuous_focus: true,
        }
    }
}

impl StreamConstraints {
    pub fn for_device(&self, device_id: impl Into<String>) -> Self {
        Self {
            device_id: Some(device_id.into()),
            facing_mode: None,
            ..self.clone()
        }
    }

    pub fn for_facing(&self, facing_mode: FacingMode) -> Self {
        Self {
            device_id: None,
            facing_mode: Some(facing_mode),
            ..self.clone()
        }
    }

    pub fn accepts_resolution(&self, width: u32, height: u32) -> bool {
        self.width.contains(width) && self.height.contains(height)
    }
}
