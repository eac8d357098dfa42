//! In-memory status snapshots keyed by run id.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::run::{Run, RunStatus};

/// Point-in-time view of a run, as served to pollers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusSnapshot {
    pub run_id: String,
    /// Status type, e.g. "running".
    pub status: String,
    pub current_step: String,
    pub progress: u8,
    #[serde(default)]
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_reason: Option<String>,
}

impl StatusSnapshot {
    fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            status: "pending".to_string(),
            current_step: "created".to_string(),
            progress: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            paused_at: None,
            pause_reason: None,
        }
    }

    /// Rebuild a snapshot from the authoritative run record.
    pub fn from_run(run: &Run) -> Self {
        let mut snapshot = Self {
            run_id: run.id.clone(),
            status: run.status.state_type().to_string(),
            current_step: run.current_step.clone(),
            progress: run.progress,
            errors: Vec::new(),
            started_at: run.created_at,
            ended_at: None,
            paused_at: None,
            pause_reason: None,
        };

        match &run.status {
            RunStatus::Pending => {}
            RunStatus::Running { started_at } => snapshot.started_at = *started_at,
            RunStatus::Paused { reason, paused_at } => {
                snapshot.paused_at = Some(*paused_at);
                snapshot.pause_reason = Some(reason.clone());
            }
            RunStatus::Succeeded { completed_at } => snapshot.ended_at = Some(*completed_at),
            RunStatus::Failed {
                error_message,
                error_detail,
                failed_at,
            } => {
                snapshot.ended_at = Some(*failed_at);
                snapshot.errors.push(error_message.clone());
                if let Some(detail) = error_detail {
                    snapshot.errors.push(detail.clone());
                }
            }
        }

        snapshot
    }

    fn apply(&mut self, update: StatusUpdate) {
        if let Some(status) = update.status {
            if status != "paused" {
                self.paused_at = None;
                self.pause_reason = None;
            }
            self.status = status;
        }
        if let Some(started_at) = update.started_at {
            self.started_at = started_at;
        }
        if let Some(step) = update.current_step {
            self.current_step = step;
        }
        if let Some(progress) = update.progress {
            self.progress = self.progress.max(progress.min(100));
        }
        self.errors.extend(update.errors);
        if let Some(ended_at) = update.ended_at {
            self.ended_at = Some(ended_at);
        }
        if let Some(paused_at) = update.paused_at {
            self.paused_at = Some(paused_at);
        }
        if let Some(reason) = update.pause_reason {
            self.pause_reason = Some(reason);
        }
    }
}

/// A partial snapshot. `None` fields are left unchanged; errors are appended.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub status: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub current_step: Option<String>,
    pub progress: Option<u8>,
    pub errors: Vec<String>,
    pub ended_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub pause_reason: Option<String>,
}

impl StatusUpdate {
    /// The update that mirrors a run record after a transition.
    pub fn from_run(run: &Run) -> Self {
        let snapshot = StatusSnapshot::from_run(run);
        let started_at = match &run.status {
            RunStatus::Running { started_at } => Some(*started_at),
            _ => None,
        };
        Self {
            status: Some(snapshot.status),
            started_at,
            current_step: Some(snapshot.current_step),
            progress: Some(snapshot.progress),
            errors: snapshot.errors,
            ended_at: snapshot.ended_at,
            paused_at: snapshot.paused_at,
            pause_reason: snapshot.pause_reason,
        }
    }
}

/// Shared map of run id to snapshot.
///
/// The outer lock is held only to find or insert an entry; each entry has its
/// own lock, so writers for different runs never contend.
#[derive(Debug, Default)]
pub struct StatusCache {
    entries: RwLock<HashMap<String, Arc<Mutex<StatusSnapshot>>>>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a run. Replaces any existing entry.
    pub async fn create(&self, run_id: &str) -> StatusSnapshot {
        let snapshot = StatusSnapshot::new(run_id);
        self.insert(snapshot.clone()).await;
        snapshot
    }

    /// Insert a fully-formed snapshot, replacing any existing entry.
    pub async fn insert(&self, snapshot: StatusSnapshot) {
        let mut entries = self.entries.write().await;
        entries.insert(snapshot.run_id.clone(), Arc::new(Mutex::new(snapshot)));
    }

    /// Merge a partial update into a run's snapshot, creating it if absent.
    pub async fn update(&self, run_id: &str, update: StatusUpdate) -> StatusSnapshot {
        let entry = self.entry(run_id).await;
        let mut snapshot = entry.lock().await;
        snapshot.apply(update);
        snapshot.clone()
    }

    pub async fn get(&self, run_id: &str) -> Option<StatusSnapshot> {
        let entry = {
            let entries = self.entries.read().await;
            entries.get(run_id).cloned()
        }?;
        let snapshot = entry.lock().await;
        Some(snapshot.clone())
    }

    /// Stop tracking a run. Returns whether an entry existed.
    pub async fn delete(&self, run_id: &str) -> bool {
        self.entries.write().await.remove(run_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn entry(&self, run_id: &str) -> Arc<Mutex<StatusSnapshot>> {
        if let Some(entry) = self.entries.read().await.get(run_id) {
            return Arc::clone(entry);
        }

        let mut entries = self.entries.write().await;
        Arc::clone(
            entries
                .entry(run_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(StatusSnapshot::new(run_id)))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::RunMode;
    use crate::tier::{FeatureSet, Tier};

    fn make_run(status: RunStatus) -> Run {
        let now = Utc::now();
        Run {
            id: "run-1".to_string(),
            owner_id: "owner".to_string(),
            tier: Tier::Premium,
            mode: RunMode::Auto,
            requested_features: FeatureSet::all(),
            status,
            current_step: "narration_ready".to_string(),
            progress: 45,
            linked_artifacts: Default::default(),
            source_text: "text".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let cache = StatusCache::new();
        cache.create("run-1").await;

        let snapshot = cache.get("run-1").await.unwrap();
        assert_eq!(snapshot.status, "pending");
        assert_eq!(snapshot.progress, 0);
        assert!(cache.get("run-2").await.is_none());
    }

    #[tokio::test]
    async fn test_partial_update() {
        let cache = StatusCache::new();
        cache.create("run-1").await;

        cache
            .update(
                "run-1",
                StatusUpdate {
                    status: Some("running".to_string()),
                    progress: Some(15),
                    ..Default::default()
                },
            )
            .await;
        let snapshot = cache
            .update(
                "run-1",
                StatusUpdate {
                    current_step: Some("outline_ready".to_string()),
                    ..Default::default()
                },
            )
            .await;

        assert_eq!(snapshot.status, "running");
        assert_eq!(snapshot.progress, 15);
        assert_eq!(snapshot.current_step, "outline_ready");
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let cache = StatusCache::new();
        cache.create("run-1").await;
        for progress in [45, 15] {
            cache
                .update(
                    "run-1",
                    StatusUpdate {
                        progress: Some(progress),
                        ..Default::default()
                    },
                )
                .await;
        }
        assert_eq!(cache.get("run-1").await.unwrap().progress, 45);
    }

    #[tokio::test]
    async fn test_resume_clears_pause_fields() {
        let cache = StatusCache::new();
        cache.create("run-1").await;
        cache
            .update(
                "run-1",
                StatusUpdate {
                    status: Some("paused".to_string()),
                    paused_at: Some(Utc::now()),
                    pause_reason: Some("review_required".to_string()),
                    ..Default::default()
                },
            )
            .await;
        let snapshot = cache
            .update(
                "run-1",
                StatusUpdate {
                    status: Some("running".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(snapshot.pause_reason, None);
        assert_eq!(snapshot.paused_at, None);
    }

    #[tokio::test]
    async fn test_update_carries_run_start_time() {
        let cache = StatusCache::new();
        cache.create("run-1").await;

        let started_at = Utc::now() - chrono::Duration::minutes(5);
        let run = make_run(RunStatus::Running { started_at });
        let snapshot = cache.update("run-1", StatusUpdate::from_run(&run)).await;

        assert_eq!(snapshot.started_at, started_at);
        assert_eq!(snapshot, StatusSnapshot::from_run(&run));
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = StatusCache::new();
        cache.create("run-1").await;
        assert!(cache.delete("run-1").await);
        assert!(!cache.delete("run-1").await);
        assert!(cache.is_empty().await);
    }

    #[test]
    fn test_snapshot_from_failed_run() {
        let run = make_run(RunStatus::Failed {
            error_message: "audio generation failed".to_string(),
            error_detail: Some("compensation of outline failed".to_string()),
            failed_at: Utc::now(),
        });
        let snapshot = StatusSnapshot::from_run(&run);
        assert_eq!(snapshot.status, "failed");
        assert_eq!(snapshot.errors.len(), 2);
        assert!(snapshot.ended_at.is_some());
    }

    #[test]
    fn test_snapshot_from_paused_run() {
        let run = make_run(RunStatus::Paused {
            reason: "review_required".to_string(),
            paused_at: Utc::now(),
        });
        let snapshot = StatusSnapshot::from_run(&run);
        assert_eq!(snapshot.pause_reason.as_deref(), Some("review_required"));
        assert_eq!(snapshot.progress, 45);
        assert!(snapshot.ended_at.is_none());
    }
}
