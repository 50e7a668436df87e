use serde::{Deserialize, Serialize};

use super::constraints::FacingMode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDevice {
    pub id: String,
    pub label: String,
}

impl VideoDevice {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    /// Facing direction guessed from the device label.
    pub fn facing_hint(&self) -> Option<FacingMode> {
        let label = self.label.to_lowercase();
        if ["back", "rear", "environment"]
            .iter()
            .any(|needle| label.contains(needle))
        {
            Some(FacingMode::Environment)
        } else if ["front", "user", "facetime"]
            .iter()
            .any(|needle| label.contains(needle))
        {
            Some(FacingMode::User)
        } else {
            None
        }
    }
}

/// Which camera to open when the user has not picked one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CameraPreference {
    Environment,
    User,
}

impl Default for CameraPreference {
    fn default() -> Self {
        CameraPreference::Environment
    }
}

impl CameraPreference {
    /// Mobile agents scan with the back camera, desktops with the webcam.
    pub fn for_user_agent(user_agent: &str) -> Self {
        let mobile = ["Mobi", "Android", "iPhone", "iPad", "iPod"]
            .iter()
            .any(|needle| user_agent.contains(needle));
        if mobile {
            CameraPreference::Environment
        } else {
            CameraPreference::User
        }
    }

    pub fn facing_mode(&self) -> FacingMode {
        match self {
            CameraPreference::Environment => FacingMode::Environment,
            CameraPreference::User => FacingMode::User,
        }
    }

    /// Index of the default device.
    ///
    /// First device whose label matches the preferred facing; otherwise the
    /// last enumerated device for `Environment` and the first for `User`.
    pub fn pick(&self, devices: &[VideoDevice]) -> Option<usize> {
        if devices.is_empty() {
            return None;
        }
        let wanted = self.facing_mode();
        if let Some(idx) = devices
            .iter()
            .position(|device| device.facing_hint() == Some(wanted))
        {
            return Some(idx);
        }
        match self {
            CameraPreference::Environment => Some(devices.len() - 1),
            CameraPreference::User => Some(0),
        }
    }
}

/// Enumerated devices plus the one currently selected.
#[derive(Debug, Clone, Default)]
pub struct DeviceSelector {
    devices: Vec<VideoDevice>,
    current: Option<usize>,
}

impl DeviceSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the device list, keeping the current device when it is still present.
    pub fn update(&mut self, devices: Vec<VideoDevice>, preference: CameraPreference) {
        let keep = self
            .current_device()
            .and_then(|current| devices.iter().position(|d| d.id == current.id));
        self.current = keep.or_else(|| preference.pick(&devices));
        self.devices = devices;
    }

    pub fn devices(&self) -> &[VideoDevice] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// A selector control is only worth showing with more than one camera.
    pub fn can_switch(&self) -> bool {
        self.devices.len() > 1
    }

    pub fn current_device(&self) -> Option<&VideoDevice> {
        self.current.and_then(|idx| self.devices.get(idx))
    }

    /// Advance in enumeration order, wrapping from the last device to the first.
    pub fn next(&mut self) -> Option<&VideoDevice> {
        if self.devices.is_empty() {
            return None;
        }
        let next = match self.current {
            Some(idx) => (idx + 1) % self.devices.len(),
            None => 0,
        };
        self.current = Some(next);
        self.devices.get(next)
    }

    pub fn select(&mut self, device_id: &str) -> Option<&VideoDevice> {
        let idx = self.devices.iter().position(|d| d.id == device_id)?;
        self.current = Some(idx);
        self.devices.get(idx)
    }
}
