//! The set of stage executors an engine drives.

use std::sync::Arc;

use crate::artifact::ArtifactStore;

use super::audio::AudioStage;
use super::narration::NarrationStage;
use super::outline::OutlineStage;
use super::traits::{AudioGenerator, NarrationGenerator, OutlineGenerator, StageExecutor};
use super::types::StageKind;

/// One executor per stage kind.
#[derive(Clone)]
pub struct StageSet {
    outline: Arc<dyn StageExecutor>,
    narration: Arc<dyn StageExecutor>,
    audio: Arc<dyn StageExecutor>,
}

impl StageSet {
    /// Build from explicit executors.
    ///
    /// Panics in debug builds if an executor is registered under the wrong kind.
    pub fn new(
        outline: Arc<dyn StageExecutor>,
        narration: Arc<dyn StageExecutor>,
        audio: Arc<dyn StageExecutor>,
    ) -> Self {
        debug_assert_eq!(outline.kind(), StageKind::Outline);
        debug_assert_eq!(narration.kind(), StageKind::Narration);
        debug_assert_eq!(audio.kind(), StageKind::Audio);
        Self {
            outline,
            narration,
            audio,
        }
    }

    /// Build the standard executors around the given generators.
    pub fn from_generators(
        outline: Arc<dyn OutlineGenerator>,
        narration: Arc<dyn NarrationGenerator>,
        audio: Arc<dyn AudioGenerator>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self::new(
            Arc::new(OutlineStage::new(outline, Arc::clone(&artifacts))),
            Arc::new(NarrationStage::new(narration, Arc::clone(&artifacts))),
            Arc::new(AudioStage::new(audio, artifacts)),
        )
    }

    pub fn get(&self, kind: StageKind) -> &Arc<dyn StageExecutor> {
        match kind {
            StageKind::Outline => &self.outline,
            StageKind::Narration => &self.narration,
            StageKind::Audio => &self.audio,
        }
    }
}
