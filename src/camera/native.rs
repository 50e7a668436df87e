use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use image::{DynamicImage, RgbImage};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::time::Duration;
use tokio::sync::oneshot;

use super::{CameraBackend, Frame, StreamConstraints, TrackInfo, VideoDevice, VideoStream};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const CAPTURE_FPS: u32 = 30;
const RETRY_DELAY: Duration = Duration::from_millis(50);

/// Cameras attached to this machine, read through nokhwa.
///
/// Each open stream gets a capture thread that owns the device and keeps
/// only the latest decoded frame around for the decode loop.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeCamera;

impl NativeCamera {
    pub fn new() -> Self {
        Self
    }

    fn query_devices() -> Result<Vec<VideoDevice>> {
        let cameras = nokhwa::query(ApiBackend::Auto).context("failed to list cameras")?;
        Ok(cameras
            .iter()
            .map(|info| VideoDevice::new(info.index().as_string(), info.human_name()))
            .collect())
    }
}

#[async_trait]
impl CameraBackend for NativeCamera {
    async fn enumerate_video_devices(&self) -> Result<Vec<VideoDevice>> {
        tokio::task::spawn_blocking(Self::query_devices)
            .await
            .context("camera query worker join failed")?
    }

    async fn acquire_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn VideoStream>> {
        let device_id = match constraints.device_id.clone() {
            Some(id) => id,
            None => {
                let devices = self.enumerate_video_devices().await?;
                let by_facing = constraints.facing_mode.and_then(|mode| {
                    devices.iter().find(|device| device.facing_hint() == Some(mode))
                });
                by_facing
                    .or_else(|| devices.first())
                    .map(|device| device.id.clone())
                    .ok_or_else(|| anyhow!("no cameras attached"))?
            }
        };

        let latest = Arc::new(Mutex::new(None));
        let live = Arc::new(AtomicBool::new(true));
        let (opened_tx, opened_rx) = oneshot::channel();

        let capture = CaptureThread {
            index: camera_index(&device_id),
            format: capture_format(constraints),
            latest: Arc::clone(&latest),
            live: Arc::clone(&live),
        };
        std::thread::Builder::new()
            .name(format!("camera-{device_id}"))
            .spawn(move || capture.run(opened_tx))
            .context("failed to spawn camera capture thread")?;

        let opened = opened_rx
            .await
            .context("camera capture thread exited before opening")??;
        if !constraints.accepts_resolution(opened.width, opened.height) {
            log_warn!(
                "camera {} delivers {}x{}, outside the requested range",
                device_id,
                opened.width,
                opened.height
            );
        }
        log_info!(
            "opened camera {} ({}) at {}x{}",
            device_id,
            opened.label,
            opened.width,
            opened.height
        );

        Ok(Box::new(NativeStream {
            device_id,
            label: opened.label,
            resolution: (opened.width, opened.height),
            latest,
            live,
        }))
    }
}

/// Device ids are nokhwa index strings; numeric ones address a camera by position.
pub fn camera_index(device_id: &str) -> CameraIndex {
    match device_id.parse::<u32>() {
        Ok(index) => CameraIndex::Index(index),
        Err(_) => CameraIndex::String(device_id.to_string()),
    }
}

/// The capture format closest to the ideal stream dimensions.
pub fn capture_format(constraints: &StreamConstraints) -> CameraFormat {
    CameraFormat::new(
        Resolution::new(constraints.width.ideal, constraints.height.ideal),
        FrameFormat::MJPEG,
        CAPTURE_FPS,
    )
}

/// Rebuild an RGB buffer as an RGBA frame. `None` when the buffer is short.
pub fn frame_from_rgb(width: u32, height: u32, rgb: Vec<u8>, sequence: u64) -> Option<Frame> {
    let rgb = RgbImage::from_raw(width, height, rgb)?;
    Some(Frame::new(
        Arc::new(DynamicImage::ImageRgb8(rgb).to_rgba8()),
        sequence,
    ))
}

struct Opened {
    label: String,
    width: u32,
    height: u32,
}

struct CaptureThread {
    index: CameraIndex,
    format: CameraFormat,
    latest: Arc<Mutex<Option<Frame>>>,
    live: Arc<AtomicBool>,
}

impl CaptureThread {
    fn run(self, opened_tx: oneshot::Sender<Result<Opened>>) {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(self.format));
        let mut camera = match Camera::new(self.index.clone(), requested)
            .and_then(|mut camera| camera.open_stream().map(|_| camera))
        {
            Ok(camera) => camera,
            Err(err) => {
                let err = anyhow!("failed to open camera {}: {err}", self.index);
                let _ = opened_tx.send(Err(err));
                return;
            }
        };

        let resolution = camera.resolution();
        let opened = Opened {
            label: camera.info().human_name(),
            width: resolution.width(),
            height: resolution.height(),
        };
        if opened_tx.send(Ok(opened)).is_err() {
            // Nobody is waiting any more (timed out or cancelled).
            log_info!("camera {} opened after its request was dropped", self.index);
            self.live.store(false, Ordering::SeqCst);
        }

        let mut sequence: u64 = 0;
        while self.live.load(Ordering::SeqCst) {
            let decoded = camera
                .frame()
                .and_then(|buffer| buffer.decode_image::<RgbFormat>());
            let image = match decoded {
                Ok(image) => image,
                Err(err) => {
                    log_warn!("frame capture on camera {} failed: {err}", self.index);
                    std::thread::sleep(RETRY_DELAY);
                    continue;
                }
            };

            let (width, height) = (image.width(), image.height());
            sequence += 1;
            match frame_from_rgb(width, height, image.into_raw(), sequence) {
                Some(frame) => {
                    if let Ok(mut latest) = self.latest.lock() {
                        *latest = Some(frame);
                    }
                }
                None => log_debug!("dropping malformed {width}x{height} frame"),
            }
        }

        if let Err(err) = camera.stop_stream() {
            log_warn!("camera {} did not stop cleanly: {err}", self.index);
        }
        log_info!("capture thread for camera {} finished", self.index);
    }
}

struct NativeStream {
    device_id: String,
    label: String,
    resolution: (u32, u32),
    latest: Arc<Mutex<Option<Frame>>>,
    live: Arc<AtomicBool>,
}

impl Drop for NativeStream {
    fn drop(&mut self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

impl VideoStream for NativeStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn tracks(&self) -> Vec<TrackInfo> {
        vec![TrackInfo {
            id: format!("{}-video", self.device_id),
            label: self.label.clone(),
            live: self.live.load(Ordering::SeqCst),
        }]
    }

    fn stop_tracks(&self) {
        self.live.store(false, Ordering::SeqCst);
        if let Ok(mut latest) = self.latest.lock() {
            latest.take();
        }
    }

    fn current_frame(&self) -> Option<Frame> {
        if !self.live.load(Ordering::SeqCst) {
            return None;
        }
        self.latest.lock().ok().and_then(|latest| latest.clone())
    }

    /// The capture format is fixed once the device is open; a mismatch is
    /// only reported.
    fn apply_constraints(&self, constraints: &StreamConstraints) -> Result<()> {
        let (width, height) = self.resolution;
        if !constraints.accepts_resolution(width, height) {
            log_warn!(
                "camera {} stays at {}x{}; reopen it to change resolution",
                self.device_id,
                width,
                height
            );
        }
        Ok(())
    }
}
