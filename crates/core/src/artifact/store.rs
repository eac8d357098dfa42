//! Artifact storage trait.

use crate::persistence::PersistenceError;
use crate::stage::StageKind;

use super::{ArtifactContent, StoredArtifact};

/// Durable storage for stage outputs.
pub trait ArtifactStore: Send + Sync {
    /// Store a new artifact for a run and return it with its assigned id.
    fn put(&self, run_id: &str, content: ArtifactContent)
        -> Result<StoredArtifact, PersistenceError>;

    /// Get an artifact by id.
    fn get(&self, id: &str) -> Result<Option<StoredArtifact>, PersistenceError>;

    /// Overwrite the content of an existing artifact, keeping its id.
    fn replace(&self, id: &str, content: ArtifactContent)
        -> Result<StoredArtifact, PersistenceError>;

    /// Delete an artifact. Returns the deleted artifact.
    fn delete(&self, id: &str) -> Result<StoredArtifact, PersistenceError>;

    /// List a run's artifacts, optionally restricted to one stage, oldest first.
    fn list_by_run(
        &self,
        run_id: &str,
        kind: Option<StageKind>,
    ) -> Result<Vec<StoredArtifact>, PersistenceError>;
}
