use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::registry::ResultRegistry;
use crate::settings::ScannerSettings;

/// One scanning session: the seen set and result log, from start until stop.
#[derive(Debug)]
pub struct ScanSession {
    id: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    registry: ResultRegistry,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub result_count: usize,
}

pub type SharedSession = Arc<Mutex<ScanSession>>;

impl ScanSession {
    pub fn new(settings: &ScannerSettings) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            ended_at: None,
            registry: ResultRegistry::new(settings.oriented_overlay)
                .with_capacity_limit(settings.max_results),
        }
    }

    pub fn shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn registry(&self) -> &ResultRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ResultRegistry {
        &mut self.registry
    }

    /// Forget every result; later detections of the same payloads count as new.
    pub fn reset(&mut self) {
        self.registry.clear();
    }

    pub fn end(&mut self) {
        if self.ended_at.is_none() {
            self.ended_at = Some(Utc::now());
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
            result_count: self.registry.len(),
        }
    }
}

/// Lock a shared session. The guarded sections never panic mid-update, so a
/// poisoned lock still holds consistent data.
pub fn lock_session(session: &SharedSession) -> MutexGuard<'_, ScanSession> {
    session
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
