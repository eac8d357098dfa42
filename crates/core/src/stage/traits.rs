//! Stage and generator contracts.

use async_trait::async_trait;

use crate::artifact::{AudioArtifact, NarrationArtifact, OutlineArtifact};

use super::error::{CompensationError, GeneratorError, StageError, ValidationError};
use super::types::{GenerationOptions, StageContext, StageInput, StageKind, StageResult};

/// Uniform contract every pipeline stage implements.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// Which stage this is.
    fn kind(&self) -> StageKind;

    /// Cheap precondition check on the input. Must not perform I/O.
    fn validate_input(&self, input: &StageInput<'_>) -> Result<(), ValidationError>;

    /// Produce and persist this stage's artifact.
    ///
    /// May be slow. Safe to call again after a failure, but the engine never
    /// retries on its own.
    async fn execute(
        &self,
        ctx: &StageContext,
        input: &StageInput<'_>,
    ) -> Result<StageResult, StageError>;

    /// Undo the persisted side effects of a previous `execute`.
    async fn compensate(&self, result: &StageResult) -> Result<(), CompensationError>;
}

/// Produces a slide outline from source text.
#[async_trait]
pub trait OutlineGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate_outline(
        &self,
        source_text: &str,
        options: &GenerationOptions,
    ) -> Result<OutlineArtifact, GeneratorError>;
}

/// Produces a narration script from an outline.
#[async_trait]
pub trait NarrationGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate_narration(
        &self,
        outline: &OutlineArtifact,
        options: &GenerationOptions,
    ) -> Result<NarrationArtifact, GeneratorError>;
}

/// Renders narration to audio.
#[async_trait]
pub trait AudioGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate_audio(
        &self,
        narration: &NarrationArtifact,
        options: &GenerationOptions,
    ) -> Result<AudioArtifact, GeneratorError>;

    /// Release whatever the generator created for `audio` (e.g. a rendered
    /// file). Called during compensation before the artifact record is removed.
    async fn discard_audio(&self, _audio: &AudioArtifact) -> Result<(), GeneratorError> {
        Ok(())
    }
}
