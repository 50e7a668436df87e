use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
    time::Duration,
};

use crate::camera::{CameraPreference, StreamConstraints};
use crate::decoder::DecodeHints;
use crate::notify::NotificationSettings;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

pub const CONFIG_ENV: &str = "LIVESCAN_CONFIG";
pub const DEBUG_ENV: &str = "LIVESCAN_DEBUG";
pub const DEFAULT_CONFIG_FILE: &str = "livescan.json";

/// Part of the frame handed to the decoder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DecodeRegion {
    Full,
    /// Central window left after trimming `margin_px` off every side.
    #[serde(rename_all = "camelCase")]
    Center { margin_px: u32 },
}

impl Default for DecodeRegion {
    fn default() -> Self {
        DecodeRegion::Full
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScannerSettings {
    pub scan_interval_ms: u64,
    pub overlay_ttl_ms: u64,
    pub crop_padding_px: u32,
    pub capture_crops: bool,
    pub oriented_overlay: bool,
    pub decode_region: DecodeRegion,
    pub hints: DecodeHints,
    pub constraints: StreamConstraints,
    pub camera_preference: CameraPreference,
    pub acquire_timeout_ms: u64,
    /// `None` keeps every result for the whole session.
    pub max_results: Option<usize>,
    pub notification: NotificationSettings,
    /// Image directories served as cameras by the replay backend.
    pub devices: Vec<PathBuf>,
    pub replay_frame_ms: u64,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            scan_interval_ms: 200,
            overlay_ttl_ms: 3000,
            crop_padding_px: 50,
            capture_crops: true,
            oriented_overlay: true,
            decode_region: DecodeRegion::Full,
            hints: DecodeHints::default(),
            constraints: StreamConstraints::default(),
            camera_preference: CameraPreference::Environment,
            acquire_timeout_ms: 10_000,
            max_results: None,
            notification: NotificationSettings::default(),
            devices: Vec::new(),
            replay_frame_ms: 33,
        }
    }
}

impl ScannerSettings {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms.max(1))
    }

    pub fn overlay_ttl(&self) -> Duration {
        Duration::from_millis(self.overlay_ttl_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn replay_frame_period(&self) -> Duration {
        Duration::from_millis(self.replay_frame_ms.max(1))
    }
}

/// Settings file location: `$LIVESCAN_CONFIG`, else `livescan.json` in the working directory.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

pub fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ScannerSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log_warn!(
                    "ignoring malformed settings in {}: {err}",
                    path.display()
                );
                ScannerSettings::default()
            })
        } else {
            ScannerSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn scanner(&self) -> ScannerSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, settings: ScannerSettings) -> Result<()> {
        let mut guard = self
            .data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &ScannerSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_observed_behavior() {
        let s = ScannerSettings::default();
        assert_eq!(s.scan_interval(), Duration::from_millis(200));
        assert_eq!(s.overlay_ttl(), Duration::from_millis(3000));
        assert_eq!(s.crop_padding_px, 50);
        assert!(s.max_results.is_none());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SettingsStore::new(dir.path().join("absent.json")).expect("store");
        assert_eq!(store.scanner(), ScannerSettings::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("livescan.json");
        fs::write(
            &path,
            r#"{ "scanIntervalMs": 150, "decodeRegion": { "center": { "marginPx": 40 } } }"#,
        )
        .expect("write");

        let settings = SettingsStore::new(path).expect("store").scanner();
        assert_eq!(settings.scan_interval_ms, 150);
        assert_eq!(settings.decode_region, DecodeRegion::Center { margin_px: 40 });
        assert_eq!(settings.overlay_ttl_ms, 3000);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("livescan.json");
        fs::write(&path, "{ not json").expect("write");
        let store = SettingsStore::new(path).expect("store");
        assert_eq!(store.scanner(), ScannerSettings::default());
    }

    #[test]
    fn update_persists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("livescan.json");
        let store = SettingsStore::new(path.clone()).expect("store");

        let mut settings = store.scanner();
        settings.max_results = Some(500);
        store.update(settings).expect("update");

        let reloaded = SettingsStore::new(path).expect("reload").scanner();
        assert_eq!(reloaded.max_results, Some(500));
    }
}
