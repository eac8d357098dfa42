//! Outline stage.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::info;

use crate::artifact::{ArtifactContent, ArtifactStore};

use super::artifacts::{remove_output, store_output};
use super::error::{CompensationError, StageError, ValidationError};
use super::traits::{OutlineGenerator, StageExecutor};
use super::types::{StageContext, StageInput, StageKind, StageResult};

/// Turns the run's source text into a slide outline.
pub struct OutlineStage {
    generator: Arc<dyn OutlineGenerator>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl OutlineStage {
    pub fn new(generator: Arc<dyn OutlineGenerator>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            generator,
            artifacts,
        }
    }
}

#[async_trait]
impl StageExecutor for OutlineStage {
    fn kind(&self) -> StageKind {
        StageKind::Outline
    }

    fn validate_input(&self, input: &StageInput<'_>) -> Result<(), ValidationError> {
        if input.source_text.trim().is_empty() {
            return Err(ValidationError::EmptySource {
                stage: StageKind::Outline,
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

        let outline = self
            .generator
            .generate_outline(input.source_text, &ctx.options)
            .await
            .map_err(|source| StageError::Generator {
                stage: StageKind::Outline,
                source,
            })?;

        info!(
            "Generated outline for run {} with {} slides ({})",
            ctx.run_id,
            outline.slide_count(),
            self.generator.name()
        );

        store_output(
            self.artifacts.as_ref(),
            ctx,
            ArtifactContent::Outline(outline),
            started,
        )
    }

    async fn compensate(&self, result: &StageResult) -> Result<(), CompensationError> {
        remove_output(self.artifacts.as_ref(), result)
    }
}
