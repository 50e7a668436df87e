//! Camera acquisition: device enumeration, stream constraints and the
//! frame source the decode loop reads from.

pub mod constraints;
pub mod device;
pub mod frame;
#[cfg(feature = "camera")]
pub mod native;
pub mod replay;

pub use constraints::{DimensionRange, FacingMode, StreamConstraints};
pub use device::{CameraPreference, DeviceSelector, VideoDevice};
pub use frame::Frame;
#[cfg(feature = "camera")]
pub use native::NativeCamera;
pub use replay::{ReplayCamera, ReplaySource};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub id: String,
    pub label: String,
    pub live: bool,
}

/// Platform camera access.
#[async_trait]
pub trait CameraBackend: Send + Sync {
    async fn enumerate_video_devices(&self) -> Result<Vec<VideoDevice>>;

    /// Open a stream. May wait indefinitely on a permission prompt; callers
    /// bound it with a timeout.
    async fn acquire_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn VideoStream>>;
}

/// An open camera stream.
pub trait VideoStream: Send + Sync {
    fn device_id(&self) -> &str;

    fn tracks(&self) -> Vec<TrackInfo>;

    /// Stop every track. Idempotent.
    fn stop_tracks(&self);

    fn is_active(&self) -> bool {
        self.tracks().iter().any(|track| track.live)
    }

    /// The latest frame, or `None` while no stable frame is available.
    fn current_frame(&self) -> Option<Frame>;

    fn apply_constraints(&self, constraints: &StreamConstraints) -> Result<()>;
}
