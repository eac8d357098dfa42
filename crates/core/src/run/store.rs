//! Run storage trait and request types.

use crate::persistence::PersistenceError;
use crate::stage::StageKind;
use crate::tier::{FeatureSet, Tier};

use super::{Run, RunMode, RunStatus};

/// Request to create a new run.
#[derive(Debug, Clone)]
pub struct CreateRunRequest {
    pub owner_id: String,
    pub mode: RunMode,
    pub features: FeatureSet,
    pub tier: Tier,
    pub source_text: String,
}

/// Durable, authoritative storage for runs.
pub trait RunStore: Send + Sync {
    /// Create a run in the `Pending` state with progress 0.
    fn create(&self, request: CreateRunRequest) -> Result<Run, PersistenceError>;

    /// Move a run to `status`, optionally updating its step label and progress.
    ///
    /// Rejects illegal state-machine transitions. Progress never decreases:
    /// a lower value than the stored one is ignored.
    fn update_status(
        &self,
        id: &str,
        status: RunStatus,
        current_step: Option<&str>,
        progress: Option<u8>,
    ) -> Result<Run, PersistenceError>;

    /// Record the artifact a stage produced.
    fn link_artifact(
        &self,
        id: &str,
        stage: StageKind,
        artifact_id: &str,
    ) -> Result<Run, PersistenceError>;

    /// Drop a stage's artifact link. Only rollback calls this.
    fn unlink_artifact(&self, id: &str, stage: StageKind) -> Result<Run, PersistenceError>;

    /// Get a run by id.
    fn get(&self, id: &str) -> Result<Option<Run>, PersistenceError>;

    /// Newest runs first.
    fn list_by_owner(&self, owner_id: &str, limit: usize) -> Result<Vec<Run>, PersistenceError>;

    /// Runs whose status type (e.g. "running") matches, oldest first.
    fn list_by_status(&self, state_type: &str, limit: usize)
        -> Result<Vec<Run>, PersistenceError>;

    /// Count runs, optionally only those in one status type.
    fn count(&self, state_type: Option<&str>) -> Result<u64, PersistenceError>;
}
