use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use image::RgbaImage;
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::time::Instant;

use super::{CameraBackend, Frame, StreamConstraints, TrackInfo, VideoDevice, VideoStream};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Where a replay device gets its frames from.
#[derive(Debug, Clone)]
pub enum ReplaySource {
    /// Every png/jpg/bmp file in the directory, in file name order.
    Directory(PathBuf),
    Frames(Vec<Arc<RgbaImage>>),
}

#[derive(Debug, Clone)]
struct ReplayDevice {
    device: VideoDevice,
    source: ReplaySource,
}

/// Camera backend that plays still images back as a looping video stream.
#[derive(Debug, Clone)]
pub struct ReplayCamera {
    devices: Vec<ReplayDevice>,
    frame_period: Duration,
    busy: Arc<Mutex<Vec<String>>>,
}

impl ReplayCamera {
    pub fn new(frame_period: Duration) -> Self {
        Self {
            devices: Vec::new(),
            frame_period,
            busy: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_device(mut self, device: VideoDevice, source: ReplaySource) -> Self {
        self.devices.push(ReplayDevice { device, source });
        self
    }

    /// One device per directory, labelled with the directory name.
    pub fn from_directories(dirs: &[PathBuf], frame_period: Duration) -> Self {
        dirs.iter()
            .enumerate()
            .fold(Self::new(frame_period), |camera, (idx, dir)| {
                let label = dir
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| format!("camera {idx}"));
                camera.with_device(
                    VideoDevice::new(format!("replay-{idx}"), label),
                    ReplaySource::Directory(dir.clone()),
                )
            })
    }

    /// Make a device refuse to open, like a camera held by another application.
    pub fn mark_busy(&self, device_id: &str) {
        if let Ok(mut busy) = self.busy.lock() {
            busy.push(device_id.to_string());
        }
    }

    fn resolve(&self, constraints: &StreamConstraints) -> Result<&ReplayDevice> {
        if let Some(id) = constraints.device_id.as_deref() {
            return self
                .devices
                .iter()
                .find(|d| d.device.id == id)
                .ok_or_else(|| anyhow!("no camera with id {id}"));
        }

        let by_facing = constraints.facing_mode.and_then(|mode| {
            self.devices
                .iter()
                .find(|d| d.device.facing_hint() == Some(mode))
        });
        by_facing
            .or_else(|| self.devices.first())
            .ok_or_else(|| anyhow!("no cameras attached"))
    }
}

#[async_trait]
impl CameraBackend for ReplayCamera {
    async fn enumerate_video_devices(&self) -> Result<Vec<VideoDevice>> {
        Ok(self.devices.iter().map(|d| d.device.clone()).collect())
    }

    async fn acquire_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn VideoStream>> {
        let replay = self.resolve(constraints)?;
        let device_id = replay.device.id.clone();

        let is_busy = self
            .busy
            .lock()
            .map(|busy| busy.contains(&device_id))
            .unwrap_or(false);
        if is_busy {
            bail!("camera {device_id} is in use by another application");
        }

        let frames = match &replay.source {
            ReplaySource::Frames(frames) => frames.clone(),
            ReplaySource::Directory(dir) => {
                let dir = dir.clone();
                tokio::task::spawn_blocking(move || load_frames(&dir))
                    .await
                    .context("frame loader worker join failed")??
            }
        };
        if frames.is_empty() {
            bail!("camera {device_id} produced no frames");
        }

        if let Some(first) = frames.first() {
            if !constraints.accepts_resolution(first.width(), first.height()) {
                log_warn!(
                    "camera {} delivers {}x{}, outside the requested range",
                    device_id,
                    first.width(),
                    first.height()
                );
            }
        }

        log_info!(
            "opened replay camera {} ({}) with {} frames",
            device_id,
            replay.device.label,
            frames.len()
        );

        Ok(Box::new(ReplayStream {
            device_id,
            label: replay.device.label.clone(),
            frames,
            frame_period: self.frame_period,
            started: Instant::now(),
            live: AtomicBool::new(true),
        }))
    }
}

fn load_frames(dir: &Path) -> Result<Vec<Arc<RgbaImage>>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read camera directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| {
                    matches!(
                        ext.to_ascii_lowercase().as_str(),
                        "png" | "jpg" | "jpeg" | "bmp"
                    )
                })
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    paths
        .iter()
        .map(|path| {
            image::open(path)
                .map(|img| Arc::new(img.to_rgba8()))
                .with_context(|| format!("failed to decode frame {}", path.display()))
        })
        .collect()
}

struct ReplayStream {
    device_id: String,
    label: String,
    frames: Vec<Arc<RgbaImage>>,
    frame_period: Duration,
    started: Instant,
    live: AtomicBool,
}

impl VideoStream for ReplayStream {
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
        if self.live.swap(false, Ordering::SeqCst) {
            log_info!("stopped tracks of camera {}", self.device_id);
        }
    }

    fn current_frame(&self) -> Option<Frame> {
        if !self.live.load(Ordering::SeqCst) || self.frames.is_empty() {
            return None;
        }
        let period_ms = self.frame_period.as_millis().max(1);
        let sequence = (self.started.elapsed().as_millis() / period_ms) as u64;
        let idx = (sequence % self.frames.len() as u64) as usize;
        Some(Frame::new(Arc::clone(&self.frames[idx]), sequence))
    }

    fn apply_constraints(&self, constraints: &StreamConstraints) -> Result<()> {
        if let Some(id) = constraints.device_id.as_deref() {
            if id != self.device_id {
                bail!("cannot retarget stream {} to device {id}", self.device_id);
            }
        }
        Ok(())
    }
}
