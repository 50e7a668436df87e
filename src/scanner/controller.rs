use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::camera::{CameraBackend, DeviceSelector, VideoDevice, VideoStream};
use crate::decoder::SymbolDecoder;
use crate::error::ScanError;
use crate::models::ResultRecord;
use crate::notify::Notifier;
use crate::presentation::{ControlState, PresentationSink, Presenter};
use crate::settings::ScannerSettings;

use super::driver::{
    DecodeDriver, DriverContext, DriverHandle, DriverStats, DriverStatsSnapshot,
};
use super::session::{lock_session, ScanSession, SessionSummary, SharedSession};
use super::state::ScannerStatus;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Owns the camera stream, the decode driver and the current session.
pub struct ScanController {
    camera: Arc<dyn CameraBackend>,
    decoder: Arc<dyn SymbolDecoder>,
    notifier: Arc<dyn Notifier>,
    presenter: Presenter,
    settings: ScannerSettings,
    inner: tokio::sync::Mutex<ControllerInner>,
    /// Held outside `inner` so a pending start can be cancelled while it owns the lock.
    pending_start: Mutex<Option<CancellationToken>>,
}

#[derive(Default)]
struct ControllerInner {
    selector: DeviceSelector,
    session: Option<SharedSession>,
    stream: Option<Arc<dyn VideoStream>>,
    driver: Option<DriverHandle>,
    stats: Arc<DriverStats>,
    status: ScannerStatus,
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.cancel();
        }
        if let Some(stream) = self.stream.take() {
            stream.stop_tracks();
        }
    }
}

impl ScanController {
    pub fn new(
        camera: Arc<dyn CameraBackend>,
        decoder: Arc<dyn SymbolDecoder>,
        sink: Arc<dyn PresentationSink>,
        notifier: Arc<dyn Notifier>,
        settings: ScannerSettings,
    ) -> Self {
        Self {
            camera,
            decoder,
            notifier,
            presenter: Presenter::new(sink, settings.overlay_ttl()),
            settings,
            inner: tokio::sync::Mutex::new(ControllerInner::default()),
            pending_start: Mutex::new(None),
        }
    }

    pub fn presenter(&self) -> &Presenter {
        &self.presenter
    }

    /// Enumerate cameras, open the preferred one and start decoding into a
    /// fresh session. Calling it while already scanning changes nothing.
    pub async fn start(&self) -> Result<ScannerStatus, ScanError> {
        let mut inner = self.inner.lock().await;
        if inner.driver.is_some() {
            log_info!("start ignored: already scanning");
            return Ok(inner.status.clone());
        }

        inner.status = ScannerStatus::Starting;
        self.presenter.sink().status("Starting camera");

        let devices = match self.camera.enumerate_video_devices().await {
            Ok(devices) => devices,
            Err(err) => {
                return Err(self.disable(&mut inner, ScanError::Acquisition(format!("{err:#}"))))
            }
        };
        if devices.is_empty() {
            return Err(self.disable(&mut inner, ScanError::NoDevices));
        }
        inner.selector.update(devices, self.settings.camera_preference);

        let device = inner.selector.current_device().cloned();
        let stream = match self.acquire(device.as_ref()).await {
            Ok(stream) => stream,
            Err(err) => return Err(self.disable(&mut inner, err)),
        };

        let session = ScanSession::new(&self.settings);
        log_info!("scan session {} started", session.id());
        inner.session = Some(session.shared());
        inner.stats = Arc::new(DriverStats::default());
        self.presenter.clear_overlays();
        self.launch(&mut inner, stream);
        Ok(inner.status.clone())
    }

    /// Stop decoding, release the camera and close the session. Results stay
    /// readable until the next start. Safe to call at any time.
    pub async fn stop(&self) -> Result<()> {
        self.cancel_pending_start();
        let mut inner = self.inner.lock().await;

        let was_running = inner.driver.is_some() || inner.stream.is_some();
        let halted = self.halt(&mut inner).await;

        if let Some(session) = &inner.session {
            let mut session = lock_session(session);
            if !session.is_ended() {
                session.end();
                log_info!(
                    "scan session {} stopped with {} results",
                    session.id(),
                    session.registry().len()
                );
            }
        }

        if was_running || inner.status == ScannerStatus::Starting {
            inner.status = ScannerStatus::Stopped;
            let can_switch = inner.selector.can_switch();
            self.presenter.sink().controls_changed(ControlState::idle(can_switch));
            self.presenter.sink().status("Scanning stopped");
        }
        halted
    }

    /// Abort a start that is still waiting for the camera. Returns whether one was pending.
    pub fn cancel_pending_start(&self) -> bool {
        let pending = self
            .pending_start
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match pending {
            Some(token) => {
                token.cancel();
                log_info!("pending camera start cancelled");
                true
            }
            None => false,
        }
    }

    /// Move to the next camera, wrapping after the last. While scanning the
    /// old stream is released before the new one is requested and the
    /// session carries over.
    pub async fn switch_to_next_camera(&self) -> Result<VideoDevice, ScanError> {
        let mut inner = self.inner.lock().await;
        if inner.selector.is_empty() {
            self.refresh_selector(&mut inner).await?;
        }

        let device = inner.selector.next().cloned().ok_or(ScanError::NoDevices)?;
        self.change_device(&mut inner, device).await
    }

    pub async fn select_camera(&self, device_id: &str) -> Result<VideoDevice, ScanError> {
        let mut inner = self.inner.lock().await;
        if inner.selector.is_empty() {
            self.refresh_selector(&mut inner).await?;
        }

        let device = inner
            .selector
            .select(device_id)
            .cloned()
            .ok_or_else(|| ScanError::DeviceSwitch {
                device_id: device_id.to_string(),
                reason: "unknown device".to_string(),
            })?;
        self.change_device(&mut inner, device).await
    }

    /// Re-enumerate cameras, keeping the current selection when it is still present.
    pub async fn refresh_devices(&self) -> Result<Vec<VideoDevice>, ScanError> {
        let mut inner = self.inner.lock().await;
        self.refresh_selector(&mut inner).await?;
        Ok(inner.selector.devices().to_vec())
    }

    /// Clear the current session's results without stopping the camera.
    pub async fn reset_results(&self) {
        let inner = self.inner.lock().await;
        if let Some(session) = &inner.session {
            lock_session(session).reset();
        }
        self.presenter.clear_overlays();
        self.presenter.sink().status("Results cleared");
    }

    /// Results of the current (or last) session, most recent first.
    pub async fn results(&self) -> Vec<ResultRecord> {
        let inner = self.inner.lock().await;
        match &inner.session {
            Some(session) => lock_session(session).registry().records().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub async fn session_summary(&self) -> Option<SessionSummary> {
        let inner = self.inner.lock().await;
        inner
            .session
            .as_ref()
            .map(|session| lock_session(session).summary())
    }

    pub async fn status(&self) -> ScannerStatus {
        self.inner.lock().await.status.clone()
    }

    pub async fn devices(&self) -> Vec<VideoDevice> {
        self.inner.lock().await.selector.devices().to_vec()
    }

    pub async fn current_device(&self) -> Option<VideoDevice> {
        self.inner.lock().await.selector.current_device().cloned()
    }

    pub async fn stats(&self) -> DriverStatsSnapshot {
        self.inner.lock().await.stats.snapshot()
    }

    async fn refresh_selector(&self, inner: &mut ControllerInner) -> Result<(), ScanError> {
        let devices = self
            .camera
            .enumerate_video_devices()
            .await
            .map_err(|err| ScanError::Acquisition(format!("{err:#}")))?;
        if devices.is_empty() {
            return Err(ScanError::NoDevices);
        }
        inner.selector.update(devices, self.settings.camera_preference);
        Ok(())
    }

    async fn change_device(
        &self,
        inner: &mut ControllerInner,
        device: VideoDevice,
    ) -> Result<VideoDevice, ScanError> {
        if inner.driver.is_none() {
            log_info!("camera {} selected for the next start", device.id);
            self.presenter
                .sink()
                .status(&format!("Selected {}", device.label));
            return Ok(device);
        }

        log_info!("switching camera to {}", device.id);
        if let Err(err) = self.halt(inner).await {
            log_warn!("previous decode loop did not shut down cleanly: {err:#}");
        }

        match self.acquire(Some(&device)).await {
            Ok(stream) => {
                self.launch(inner, stream);
                Ok(device)
            }
            Err(ScanError::AcquisitionCancelled) => {
                Err(self.disable(inner, ScanError::AcquisitionCancelled))
            }
            Err(err) => {
                if let Some(session) = &inner.session {
                    lock_session(session).end();
                }
                let err = ScanError::DeviceSwitch {
                    device_id: device.id.clone(),
                    reason: err.to_string(),
                };
                Err(self.disable(inner, err))
            }
        }
    }

    /// Request a stream, bounded by the acquire timeout and cancellable via
    /// [`cancel_pending_start`](Self::cancel_pending_start).
    async fn acquire(
        &self,
        device: Option<&VideoDevice>,
    ) -> Result<Box<dyn VideoStream>, ScanError> {
        let constraints = match device {
            Some(device) => self.settings.constraints.for_device(&device.id),
            None => self
                .settings
                .constraints
                .for_facing(self.settings.camera_preference.facing_mode()),
        };

        let token = CancellationToken::new();
        *self
            .pending_start
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token.clone());

        let acquire = time::timeout(
            self.settings.acquire_timeout(),
            self.camera.acquire_stream(&constraints),
        );
        let result = tokio::select! {
            _ = token.cancelled() => Err(ScanError::AcquisitionCancelled),
            acquired = acquire => match acquired {
                Ok(Ok(stream)) => Ok(stream),
                Ok(Err(err)) => Err(ScanError::Acquisition(format!("{err:#}"))),
                Err(_) => Err(ScanError::AcquisitionTimeout {
                    timeout_ms: self.settings.acquire_timeout_ms,
                }),
            },
        };

        self.pending_start
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        let stream = result?;
        if let Err(err) = stream.apply_constraints(&constraints) {
            log_warn!("camera {} rejected constraints: {err:#}", stream.device_id());
        }
        Ok(stream)
    }

    fn launch(&self, inner: &mut ControllerInner, stream: Box<dyn VideoStream>) {
        let stream: Arc<dyn VideoStream> = Arc::from(stream);
        let Some(session) = inner.session.clone() else {
            log_error!("no session to decode into; releasing camera");
            stream.stop_tracks();
            return;
        };

        let device_id = stream.device_id().to_string();
        let ctx = DriverContext {
            stream: Arc::clone(&stream),
            decoder: Arc::clone(&self.decoder),
            session,
            presenter: self.presenter.clone(),
            notifier: Arc::clone(&self.notifier),
            settings: self.settings.clone(),
            stats: Arc::clone(&inner.stats),
        };

        inner.driver = Some(DecodeDriver::new(ctx).start());
        inner.stream = Some(stream);
        inner.status = ScannerStatus::Scanning {
            device_id: device_id.clone(),
        };

        let label = inner
            .selector
            .current_device()
            .map(|device| device.label.clone())
            .unwrap_or_else(|| device_id.clone());
        let sink = self.presenter.sink();
        sink.controls_changed(ControlState::scanning(inner.selector.can_switch()));
        sink.status(&format!("Scanning with {label}"));
        log_info!("decoding from camera {device_id}");
    }

    /// Stop the driver, then release the stream's tracks.
    async fn halt(&self, inner: &mut ControllerInner) -> Result<()> {
        let stopped = match inner.driver.take() {
            Some(driver) => driver.stop().await.context("failed to stop decode driver"),
            None => Ok(()),
        };

        if let Some(stream) = inner.stream.take() {
            stream.stop_tracks();
            log_info!("released camera {}", stream.device_id());
        }
        stopped
    }

    /// Record a failed start or switch and tell the UI. Returns the error for the caller.
    fn disable(&self, inner: &mut ControllerInner, err: ScanError) -> ScanError {
        let sink = self.presenter.sink();
        if err == ScanError::AcquisitionCancelled {
            log_info!("{err}");
            inner.status = ScannerStatus::Stopped;
            sink.controls_changed(ControlState::idle(inner.selector.can_switch()));
            sink.status("Camera start cancelled");
            return err;
        }

        log_error!("{err}");
        inner.status = ScannerStatus::Disabled {
            reason: err.to_string(),
        };
        sink.error_notice(&err);
        sink.controls_changed(ControlState::disabled());
        err
    }
}
