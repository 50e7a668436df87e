use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use crate::geometry::{BoundingRegion, Point};

/// Transient highlight drawn over the video where a symbol was found.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overlay {
    pub id: String,
    pub record_id: String,
    pub payload: String,
    pub region: BoundingRegion,
    /// Polygon to stroke, already rotated for oriented regions.
    pub outline: [Point; 4],
    pub shown_at: DateTime<Utc>,
    pub ttl_ms: u64,
}

impl Overlay {
    pub fn new(record_id: &str, payload: &str, region: BoundingRegion, ttl: Duration) -> Self {
        let outline = match region {
            BoundingRegion::Oriented(oriented) => oriented.corners(),
            BoundingRegion::Axis(rect) => [
                Point::new(rect.x, rect.y),
                Point::new(rect.right(), rect.y),
                Point::new(rect.right(), rect.bottom()),
                Point::new(rect.x, rect.bottom()),
            ],
        };
        Self {
            id: Uuid::new_v4().to_string(),
            record_id: record_id.to_string(),
            payload: payload.to_string(),
            region,
            outline,
            shown_at: Utc::now(),
            ttl_ms: ttl.as_millis() as u64,
        }
    }
}

struct Entry {
    overlay: Overlay,
    expires_at: Instant,
}

/// Overlays currently on screen. Each one carries its own expiry, so a new
/// detection never extends or cuts short an earlier highlight.
#[derive(Default)]
pub struct OverlayLayer {
    entries: Mutex<Vec<Entry>>,
}

impl OverlayLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&self, overlay: Overlay, now: Instant) {
        let expires_at = now + Duration::from_millis(overlay.ttl_ms);
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(Entry {
                overlay,
                expires_at,
            });
        }
    }

    /// Drop an overlay early, returning whether it was still present.
    pub fn remove(&self, id: &str) -> bool {
        match self.entries.lock() {
            Ok(mut entries) => {
                let before = entries.len();
                entries.retain(|entry| entry.overlay.id != id);
                entries.len() != before
            }
            Err(_) => false,
        }
    }

    /// Overlays that are still drawn at `at`.
    pub fn visible_at(&self, at: Instant) -> Vec<Overlay> {
        self.entries
            .lock()
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| at < entry.expires_at)
                    .map(|entry| entry.overlay.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn visible_now(&self) -> Vec<Overlay> {
        self.visible_at(Instant::now())
    }

    /// Drop every overlay, returning the ids that were still present.
    pub fn clear(&self) -> Vec<String> {
        match self.entries.lock() {
            Ok(mut entries) => entries.drain(..).map(|entry| entry.overlay.id).collect(),
            Err(_) => Vec::new(),
        }
    }
}
