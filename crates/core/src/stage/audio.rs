//! Audio stage.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::artifact::{ArtifactContent, ArtifactStore};

use super::artifacts::{remove_output, store_output};
use super::error::{CompensationError, StageError, ValidationError};
use super::traits::{AudioGenerator, StageExecutor};
use super::types::{StageContext, StageInput, StageKind, StageResult};

/// Renders the narration into a timed audio track.
pub struct AudioStage {
    generator: Arc<dyn AudioGenerator>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl AudioStage {
    pub fn new(generator: Arc<dyn AudioGenerator>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            generator,
            artifacts,
        }
    }
}

#[async_trait]
impl StageExecutor for AudioStage {
    fn kind(&self) -> StageKind {
        StageKind::Audio
    }

    fn validate_input(&self, input: &StageInput<'_>) -> Result<(), ValidationError> {
        let narration =
            input
                .outputs
                .narration
                .as_ref()
                .ok_or(ValidationError::MissingPrerequisite {
                    stage: StageKind::Audio,
                    required: StageKind::Narration,
                })?;

        if narration.is_blank() {
            return Err(ValidationError::EmptyPrerequisite {
                stage: StageKind::Audio,
                required: StageKind::Narration,
            });
        }
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        input: &StageInput<'_>,
    ) -> Result<StageResult, StageError> {
        let started = Instant::now();

        let narration = input
            .outputs
            .narration
            .as_ref()
            .ok_or(StageError::MissingInput {
                stage: StageKind::Audio,
                required: StageKind::Narration,
            })?;

        let audio = self
            .generator
            .generate_audio(narration, &ctx.options)
            .await
            .map_err(|source| StageError::Generator {
                stage: StageKind::Audio,
                source,
            })?;

        info!(
            "Generated audio for run {}: {} segments, {} ms ({})",
            ctx.run_id,
            audio.segments.len(),
            audio.total_duration_ms,
            self.generator.name()
        );

        store_output(
            self.artifacts.as_ref(),
            ctx,
            ArtifactContent::Audio(audio),
            started,
        )
    }

    async fn compensate(&self, result: &StageResult) -> Result<(), CompensationError> {
        if let ArtifactContent::Audio(ref audio) = result.output {
            if let Err(e) = self.generator.discard_audio(audio).await {
                warn!("Failed to discard rendered audio {}: {}", audio.uri, e);
                return Err(CompensationError {
                    stage: StageKind::Audio,
                    artifact_id: result.artifact_id.clone(),
                    reason: e.to_string(),
                });
            }
        }
        remove_output(self.artifacts.as_ref(), result)
    }
}
