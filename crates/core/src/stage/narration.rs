//! Narration stage.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::info;

use crate::artifact::{ArtifactContent, ArtifactStore};

use super::artifacts::{remove_output, store_output};
use super::error::{CompensationError, StageError, ValidationError};
use super::traits::{NarrationGenerator, StageExecutor};
use super::types::{StageContext, StageInput, StageKind, StageResult};

/// Writes the narration script for an outline.
pub struct NarrationStage {
    generator: Arc<dyn NarrationGenerator>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl NarrationStage {
    pub fn new(
        generator: Arc<dyn NarrationGenerator>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            generator,
            artifacts,
        }
    }
}

#[async_trait]
impl StageExecutor for NarrationStage {
    fn kind(&self) -> StageKind {
        StageKind::Narration
    }

    fn validate_input(&self, input: &StageInput<'_>) -> Result<(), ValidationError> {
        let outline =
            input
                .outputs
                .outline
                .as_ref()
                .ok_or(ValidationError::MissingPrerequisite {
                    stage: StageKind::Narration,
                    required: StageKind::Outline,
                })?;

        if outline.slides.is_empty() {
            return Err(ValidationError::EmptyPrerequisite {
                stage: StageKind::Narration,
                required: StageKind::Outline,
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

        let outline = input
            .outputs
            .outline
            .as_ref()
            .ok_or(StageError::MissingInput {
                stage: StageKind::Narration,
                required: StageKind::Outline,
            })?;

        let narration = self
            .generator
            .generate_narration(outline, &ctx.options)
            .await
            .map_err(|source| StageError::Generator {
                stage: StageKind::Narration,
                source,
            })?;

        info!(
            "Generated narration for run {}: {} segments, {} words ({})",
            ctx.run_id,
            narration.segments.len(),
            narration.word_count(),
            self.generator.name()
        );

        store_output(
            self.artifacts.as_ref(),
            ctx,
            ArtifactContent::Narration(narration),
            started,
        )
    }

    async fn compensate(&self, result: &StageResult) -> Result<(), CompensationError> {
        remove_output(self.artifacts.as_ref(), result)
    }
}
