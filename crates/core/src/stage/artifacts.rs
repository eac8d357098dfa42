//! Persisting and removing stage artifacts.

use std::time::Instant;

use tracing::debug;

use crate::artifact::{ArtifactContent, ArtifactStore};

use super::error::{CompensationError, StageError};
use super::types::{StageContext, StageMetadata, StageResult};

/// Store a generated artifact and build the stage result for it.
pub(super) fn store_output(
    artifacts: &dyn ArtifactStore,
    ctx: &StageContext,
    content: ArtifactContent,
    started: Instant,
) -> Result<StageResult, StageError> {
    let stage = content.kind();
    let metadata = StageMetadata::describe(&content);

    let stored = artifacts
        .put(&ctx.run_id, content)
        .map_err(|source| StageError::Persistence { stage, source })?;

    debug!(
        "Stored {} artifact {} for run {}",
        stage, stored.id, ctx.run_id
    );

    Ok(StageResult {
        stage,
        artifact_id: stored.id,
        output: stored.content,
        metadata,
        duration_ms: started.elapsed().as_millis() as u64,
    })
}

/// Delete a stage's artifact. An artifact that is already gone counts as undone.
pub(super) fn remove_output(
    artifacts: &dyn ArtifactStore,
    result: &StageResult,
) -> Result<(), CompensationError> {
    match artifacts.delete(&result.artifact_id) {
        Ok(_) => Ok(()),
        Err(e) if e.is_not_found() => {
            debug!(
                "{} artifact {} already removed",
                result.stage, result.artifact_id
            );
            Ok(())
        }
        Err(e) => Err(CompensationError {
            stage: result.stage,
            artifact_id: result.artifact_id.clone(),
            reason: e.to_string(),
        }),
    }
}
