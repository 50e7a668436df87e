use serde::Serialize;
use tokio::sync::mpsc;

use super::overlay::Overlay;
use crate::error::ScanError;
use crate::models::ResultRecord;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

/// Which controls the UI should offer right now.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ControlState {
    pub start_enabled: bool,
    pub stop_enabled: bool,
    pub camera_select_enabled: bool,
}

impl ControlState {
    pub fn scanning(can_switch: bool) -> Self {
        Self {
            start_enabled: false,
            stop_enabled: true,
            camera_select_enabled: can_switch,
        }
    }

    pub fn idle(can_switch: bool) -> Self {
        Self {
            start_enabled: true,
            stop_enabled: false,
            camera_select_enabled: can_switch,
        }
    }

    /// After a camera failure: only a retry of start is offered.
    pub fn disabled() -> Self {
        Self {
            start_enabled: true,
            stop_enabled: false,
            camera_select_enabled: false,
        }
    }
}

/// Everything the UI layer is told about.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScanEvent {
    ResultAdded { record: ResultRecord },
    OverlayShown { overlay: Overlay },
    #[serde(rename_all = "camelCase")]
    OverlayCleared { overlay_id: String },
    Status { message: String },
    ErrorNotice { message: String, fatal: bool },
    ControlsChanged { controls: ControlState },
}

/// Consumer of render-ready output. Implementors only need [`emit`](Self::emit).
pub trait PresentationSink: Send + Sync {
    fn emit(&self, event: ScanEvent);

    fn result_added(&self, record: &ResultRecord) {
        self.emit(ScanEvent::ResultAdded {
            record: record.clone(),
        });
    }

    fn overlay_shown(&self, overlay: &Overlay) {
        self.emit(ScanEvent::OverlayShown {
            overlay: overlay.clone(),
        });
    }

    fn overlay_cleared(&self, overlay_id: &str) {
        self.emit(ScanEvent::OverlayCleared {
            overlay_id: overlay_id.to_string(),
        });
    }

    fn status(&self, message: &str) {
        self.emit(ScanEvent::Status {
            message: message.to_string(),
        });
    }

    fn error_notice(&self, error: &ScanError) {
        self.emit(ScanEvent::ErrorNotice {
            message: error.to_string(),
            fatal: error.is_fatal(),
        });
    }

    fn controls_changed(&self, controls: ControlState) {
        self.emit(ScanEvent::ControlsChanged { controls });
    }
}

/// Forwards events to a UI bridge over an unbounded channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ScanEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ScanEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PresentationSink for ChannelSink {
    fn emit(&self, event: ScanEvent) {
        // A closed receiver means the UI is gone; nothing left to render to.
        let _ = self.tx.send(event);
    }
}

/// Writes events to the log. Used by the headless binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl PresentationSink for LogSink {
    fn emit(&self, event: ScanEvent) {
        match event {
            ScanEvent::ResultAdded { record } => {
                let image = record
                    .cropped_image
                    .as_ref()
                    .map(|img| format!(", snapshot {} bytes", img.byte_len))
                    .unwrap_or_default();
                log_info!("[{}] {}{}", record.format, record.payload, image);
            }
            ScanEvent::OverlayShown { overlay } => {
                log_debug!("overlay {} shown for {}", overlay.id, overlay.payload)
            }
            ScanEvent::OverlayCleared { overlay_id } => {
                log_debug!("overlay {} cleared", overlay_id)
            }
            ScanEvent::Status { message } => log_info!("status: {}", message),
            ScanEvent::ErrorNotice { message, fatal } => {
                if fatal {
                    log_error!("{}", message);
                } else {
                    log_info!("{}", message);
                }
            }
            ScanEvent::ControlsChanged { controls } => log_debug!("controls: {:?}", controls),
        }
    }
}
