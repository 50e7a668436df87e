//! Audible and haptic confirmation of a new detection.

#[cfg(feature = "sound")]
pub mod tone;

#[cfg(feature = "sound")]
pub use tone::{Tone, ToneNotifier};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub sound: bool,
    pub vibration: bool,
    pub tone_hz: f32,
    pub tone_ms: u64,
    pub volume: f32,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            sound: true,
            vibration: true,
            tone_hz: 1800.0,
            tone_ms: 120,
            volume: 0.5,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn beep(&self) -> Result<(), String>;

    /// Best effort; devices without a vibration motor just succeed.
    fn vibrate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Notifier for hosts without audio output.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn beep(&self) -> Result<(), String> {
        log_info!("beep");
        Ok(())
    }
}

/// Fire the enabled notifications for one new detection. Failures are only logged.
pub fn notify_detection(notifier: &dyn Notifier, settings: &NotificationSettings) {
    if settings.sound {
        if let Err(err) = notifier.beep() {
            log_warn!("detection tone failed: {err}");
        }
    }
    if settings.vibration {
        if let Err(err) = notifier.vibrate() {
            log_warn!("vibration failed: {err}");
        }
    }
}

/// The notifier the binary runs with.
pub fn default_notifier(settings: &NotificationSettings) -> Arc<dyn Notifier> {
    #[cfg(feature = "sound")]
    {
        Arc::new(ToneNotifier::new(Tone::from_settings(settings)))
    }
    #[cfg(not(feature = "sound"))]
    {
        let _ = settings;
        Arc::new(LogNotifier)
    }
}
