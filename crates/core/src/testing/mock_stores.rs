//! In-memory mock stores for testing.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::artifact::{ArtifactContent, ArtifactStore, StoredArtifact};
use crate::persistence::PersistenceError;
use crate::run::{CreateRunRequest, LinkedArtifacts, Run, RunStatus, RunStore};
use crate::stage::StageKind;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock implementation of [`RunStore`].
///
/// Keeps runs in memory, enforces the same transition rules as the SQLite
/// store, and counts `create` calls so tests can assert that nothing was
/// persisted.
#[derive(Debug, Default)]
pub struct MockRunStore {
    runs: RwLock<HashMap<String, Run>>,
    /// Insertion order, for listing.
    order: RwLock<Vec<String>>,
    create_calls: RwLock<usize>,
    /// Status writes in order: (run id, status type, step, progress).
    status_writes: RwLock<Vec<(String, String, String, u8)>>,
    /// If set, every operation fails with a database error.
    unavailable: RwLock<bool>,
}

impl MockRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `create` was called.
    pub fn create_count(&self) -> usize {
        *read(&self.create_calls)
    }

    /// Every status write made so far, in order.
    pub fn status_writes(&self) -> Vec<(String, String, String, u8)> {
        read(&self.status_writes).clone()
    }

    /// Status writes for one run.
    pub fn status_writes_for(&self, run_id: &str) -> Vec<(String, String, u8)> {
        read(&self.status_writes)
            .iter()
            .filter(|(id, ..)| id == run_id)
            .map(|(_, status, step, progress)| (status.clone(), step.clone(), *progress))
            .collect()
    }

    /// Simulate the store going away (or coming back).
    pub fn set_unavailable(&self, unavailable: bool) {
        *write(&self.unavailable) = unavailable;
    }

    fn check_available(&self) -> Result<(), PersistenceError> {
        if *read(&self.unavailable) {
            Err(PersistenceError::Database("mock store unavailable".to_string()))
        } else {
            Ok(())
        }
    }

    fn modify<F>(&self, id: &str, f: F) -> Result<Run, PersistenceError>
    where
        F: FnOnce(&mut Run) -> Result<(), PersistenceError>,
    {
        self.check_available()?;
        let mut runs = write(&self.runs);
        let run = runs
            .get_mut(id)
            .ok_or_else(|| PersistenceError::run_not_found(id))?;
        f(run)?;
        run.updated_at = Utc::now();
        Ok(run.clone())
    }
}

impl RunStore for MockRunStore {
    fn create(&self, request: CreateRunRequest) -> Result<Run, PersistenceError> {
        *write(&self.create_calls) += 1;
        self.check_available()?;

        let now = Utc::now();
        let run = Run {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: request.owner_id,
            tier: request.tier,
            mode: request.mode,
            requested_features: request.features,
            status: RunStatus::Pending,
            current_step: "created".to_string(),
            progress: 0,
            linked_artifacts: LinkedArtifacts::default(),
            source_text: request.source_text,
            created_at: now,
            updated_at: now,
        };

        write(&self.order).push(run.id.clone());
        write(&self.runs).insert(run.id.clone(), run.clone());
        Ok(run)
    }

    fn update_status(
        &self,
        id: &str,
        status: RunStatus,
        current_step: Option<&str>,
        progress: Option<u8>,
    ) -> Result<Run, PersistenceError> {
        let run = self.modify(id, |run| {
            if !run.status.can_transition_to(&status) {
                return Err(PersistenceError::InvalidTransition {
                    run_id: run.id.clone(),
                    from: run.status.state_type(),
                    to: status.state_type(),
                });
            }
            run.status = status;
            if let Some(step) = current_step {
                run.current_step = step.to_string();
            }
            if let Some(progress) = progress {
                run.progress = run.progress.max(progress.min(100));
            }
            Ok(())
        })?;

        write(&self.status_writes).push((
            run.id.clone(),
            run.status.state_type().to_string(),
            run.current_step.clone(),
            run.progress,
        ));
        Ok(run)
    }

    fn link_artifact(
        &self,
        id: &str,
        stage: StageKind,
        artifact_id: &str,
    ) -> Result<Run, PersistenceError> {
        self.modify(id, |run| {
            run.linked_artifacts.set(stage, artifact_id);
            Ok(())
        })
    }

    fn unlink_artifact(&self, id: &str, stage: StageKind) -> Result<Run, PersistenceError> {
        self.modify(id, |run| {
            run.linked_artifacts.clear(stage);
            Ok(())
        })
    }

    fn get(&self, id: &str) -> Result<Option<Run>, PersistenceError> {
        self.check_available()?;
        Ok(read(&self.runs).get(id).cloned())
    }

    fn list_by_owner(&self, owner_id: &str, limit: usize) -> Result<Vec<Run>, PersistenceError> {
        self.check_available()?;
        let runs = read(&self.runs);
        Ok(read(&self.order)
            .iter()
            .rev()
            .filter_map(|id| runs.get(id))
            .filter(|run| run.owner_id == owner_id)
            .take(limit)
            .cloned()
            .collect())
    }

    fn list_by_status(
        &self,
        state_type: &str,
        limit: usize,
    ) -> Result<Vec<Run>, PersistenceError> {
        self.check_available()?;
        let runs = read(&self.runs);
        Ok(read(&self.order)
            .iter()
            .filter_map(|id| runs.get(id))
            .filter(|run| run.status.state_type() == state_type)
            .take(limit)
            .cloned()
            .collect())
    }

    fn count(&self, state_type: Option<&str>) -> Result<u64, PersistenceError> {
        self.check_available()?;
        let runs = read(&self.runs);
        Ok(runs
            .values()
            .filter(|run| state_type.map_or(true, |s| run.status.state_type() == s))
            .count() as u64)
    }
}

/// Mock implementation of [`ArtifactStore`].
///
/// Records deletions in order so tests can check compensation order, and can
/// be told to refuse deletions to simulate a failed compensation.
#[derive(Debug, Default)]
pub struct MockArtifactStore {
    artifacts: RwLock<HashMap<String, StoredArtifact>>,
    order: RwLock<Vec<String>>,
    deleted: RwLock<Vec<StoredArtifact>>,
    replaced: RwLock<Vec<String>>,
    fail_deletes: RwLock<bool>,
}

impl MockArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deleted artifacts, in deletion order.
    pub fn deleted(&self) -> Vec<StoredArtifact> {
        read(&self.deleted).clone()
    }

    /// Stage kinds of deleted artifacts, in deletion order.
    pub fn deleted_kinds(&self) -> Vec<StageKind> {
        read(&self.deleted).iter().map(StoredArtifact::kind).collect()
    }

    /// Ids passed to `replace`, in call order.
    pub fn replaced_ids(&self) -> Vec<String> {
        read(&self.replaced).clone()
    }

    /// Make every delete fail with a database error.
    pub fn set_fail_deletes(&self, fail: bool) {
        *write(&self.fail_deletes) = fail;
    }

    pub fn len(&self) -> usize {
        read(&self.artifacts).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactStore for MockArtifactStore {
    fn put(
        &self,
        run_id: &str,
        content: ArtifactContent,
    ) -> Result<StoredArtifact, PersistenceError> {
        let now = Utc::now();
        let artifact = StoredArtifact {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: run_id.to_string(),
            content,
            created_at: now,
            updated_at: now,
        };
        write(&self.order).push(artifact.id.clone());
        write(&self.artifacts).insert(artifact.id.clone(), artifact.clone());
        Ok(artifact)
    }

    fn get(&self, id: &str) -> Result<Option<StoredArtifact>, PersistenceError> {
        Ok(read(&self.artifacts).get(id).cloned())
    }

    fn replace(
        &self,
        id: &str,
        content: ArtifactContent,
    ) -> Result<StoredArtifact, PersistenceError> {
        let mut artifacts = write(&self.artifacts);
        let artifact = artifacts
            .get_mut(id)
            .ok_or_else(|| PersistenceError::artifact_not_found(id))?;
        artifact.content = content;
        artifact.updated_at = Utc::now();
        write(&self.replaced).push(id.to_string());
        Ok(artifact.clone())
    }

    fn delete(&self, id: &str) -> Result<StoredArtifact, PersistenceError> {
        if *read(&self.fail_deletes) {
            return Err(PersistenceError::Database(
                "mock artifact store refused delete".to_string(),
            ));
        }
        let artifact = write(&self.artifacts)
            .remove(id)
            .ok_or_else(|| PersistenceError::artifact_not_found(id))?;
        write(&self.deleted).push(artifact.clone());
        Ok(artifact)
    }

    fn list_by_run(
        &self,
        run_id: &str,
        kind: Option<StageKind>,
    ) -> Result<Vec<StoredArtifact>, PersistenceError> {
        let artifacts = read(&self.artifacts);
        Ok(read(&self.order)
            .iter()
            .filter_map(|id| artifacts.get(id))
            .filter(|a| a.run_id == run_id)
            .filter(|a| kind.map_or(true, |k| a.kind() == k))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::NarrationArtifact;
    use crate::run::RunMode;
    use crate::tier::{FeatureSet, Tier};

    fn request(owner: &str) -> CreateRunRequest {
        CreateRunRequest {
            owner_id: owner.to_string(),
            mode: RunMode::Auto,
            features: FeatureSet::all(),
            tier: Tier::Premium,
            source_text: "Text".to_string(),
        }
    }

    #[test]
    fn test_run_store_enforces_transitions() {
        let store = MockRunStore::new();
        let run = store.create(request("a")).unwrap();
        assert_eq!(store.create_count(), 1);

        let result = store.update_status(
            &run.id,
            RunStatus::Succeeded {
                completed_at: Utc::now(),
            },
            None,
            None,
        );
        assert!(matches!(
            result,
            Err(PersistenceError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_run_store_unavailable() {
        let store = MockRunStore::new();
        store.set_unavailable(true);
        assert!(store.create(request("a")).is_err());
        assert_eq!(store.create_count(), 1);
        assert!(store.get("x").is_err());
    }

    #[test]
    fn test_run_store_lists_newest_first() {
        let store = MockRunStore::new();
        let first = store.create(request("a")).unwrap();
        let second = store.create(request("a")).unwrap();
        store.create(request("b")).unwrap();

        let runs = store.list_by_owner("a", 10).unwrap();
        let ids: Vec<&str> = runs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
        assert_eq!(store.count(Some("pending")).unwrap(), 3);
    }

    #[test]
    fn test_artifact_store_records_deletes() {
        let store = MockArtifactStore::new();
        let narration = store
            .put(
                "run-1",
                ArtifactContent::Narration(NarrationArtifact::from_texts(["Hi."])),
            )
            .unwrap();

        store.delete(&narration.id).unwrap();
        assert_eq!(store.deleted_kinds(), vec![StageKind::Narration]);
        assert!(store.is_empty());
        assert!(store.delete(&narration.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_artifact_store_refuses_deletes() {
        let store = MockArtifactStore::new();
        let stored = store
            .put(
                "run-1",
                ArtifactContent::Narration(NarrationArtifact::from_texts(["Hi."])),
            )
            .unwrap();
        store.set_fail_deletes(true);
        assert!(store.delete(&stored.id).is_err());
        assert_eq!(store.len(), 1);
    }
}
