//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the generator and store
//! traits, allowing the engine to be exercised end to end without a database.
//!
//! # Example
//!
//! ```rust,ignore
//! use deckcast_core::testing::fixtures::{self, TestPipeline};
//!
//! let pipeline = TestPipeline::new();
//! pipeline.audio.set_always_fail(true).await;
//!
//! let outcome = pipeline.engine.start(fixtures::full_request()).await?;
//! assert!(!outcome.success);
//! ```

mod mock_generators;
mod mock_stores;

pub use mock_generators::{
    GateHandle, MockAudioGenerator, MockNarrationGenerator, MockOutlineGenerator,
};
pub use mock_stores::{MockArtifactStore, MockRunStore};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{
        MockArtifactStore, MockAudioGenerator, MockNarrationGenerator, MockOutlineGenerator,
        MockRunStore,
    };
    use crate::artifact::{NarrationArtifact, OutlineArtifact, Slide};
    use crate::orchestrator::{OrchestratorConfig, PipelineEngine, StartRequest};
    use crate::run::RunMode;
    use crate::stage::{GenerationOptions, StageSet};
    use crate::status::StatusSnapshot;
    use crate::tier::{Feature, FeatureSet, Tier};

    /// Source text with three non-empty lines (three mock slides).
    pub const SOURCE_TEXT: &str =
        "Ownership and borrowing\nLifetimes in practice\nFearless concurrency";

    /// A request for the given tier, mode and features.
    pub fn start_request(tier: Tier, mode: RunMode, features: &[Feature]) -> StartRequest {
        StartRequest {
            owner_id: format!("owner-{}", uuid::Uuid::new_v4()),
            mode,
            features: FeatureSet::new(features.iter().copied()),
            source_text: SOURCE_TEXT.to_string(),
            tier,
        }
    }

    /// A premium, auto-mode request for every feature.
    pub fn full_request() -> StartRequest {
        start_request(Tier::Premium, RunMode::Auto, &Feature::ALL)
    }

    /// A premium, hybrid-mode request for every feature.
    pub fn hybrid_request() -> StartRequest {
        start_request(Tier::Premium, RunMode::Hybrid, &Feature::ALL)
    }

    /// An outline with `slides` slides.
    pub fn outline(slides: u32) -> OutlineArtifact {
        OutlineArtifact {
            title: "Fixture Deck".to_string(),
            slides: (0..slides)
                .map(|i| Slide {
                    index: i,
                    title: format!("Slide {}", i + 1),
                    bullets: vec![format!("Bullet for slide {}", i + 1)],
                })
                .collect(),
        }
    }

    /// A narration a reviewer might hand back.
    pub fn edited_narration() -> NarrationArtifact {
        NarrationArtifact::from_texts([
            "Edited opening.",
            "Edited middle section.",
            "Edited closing remarks.",
        ])
    }

    /// An engine wired to mock generators and in-memory stores.
    pub struct TestPipeline {
        pub engine: Arc<PipelineEngine>,
        pub runs: Arc<MockRunStore>,
        pub artifacts: Arc<MockArtifactStore>,
        pub outline: Arc<MockOutlineGenerator>,
        pub narration: Arc<MockNarrationGenerator>,
        pub audio: Arc<MockAudioGenerator>,
    }

    impl Default for TestPipeline {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestPipeline {
        pub fn new() -> Self {
            Self::with_config(OrchestratorConfig::default())
        }

        pub fn with_config(config: OrchestratorConfig) -> Self {
            let runs = Arc::new(MockRunStore::new());
            let artifacts = Arc::new(MockArtifactStore::new());
            let outline = Arc::new(MockOutlineGenerator::new());
            let narration = Arc::new(MockNarrationGenerator::new());
            let audio = Arc::new(MockAudioGenerator::new());

            let stages = StageSet::from_generators(
                outline.clone(),
                narration.clone(),
                audio.clone(),
                artifacts.clone(),
            );
            let engine = Arc::new(PipelineEngine::new(
                config,
                GenerationOptions::default(),
                runs.clone(),
                artifacts.clone(),
                stages,
            ));

            Self {
                engine,
                runs,
                artifacts,
                outline,
                narration,
                audio,
            }
        }

        /// Poll a run's status until `predicate` holds or `timeout` passes.
        pub async fn wait_for<F>(
            &self,
            run_id: &str,
            timeout: Duration,
            predicate: F,
        ) -> Option<StatusSnapshot>
        where
            F: Fn(&StatusSnapshot) -> bool,
        {
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                if let Ok(snapshot) = self.engine.status(run_id).await {
                    if predicate(&snapshot) {
                        return Some(snapshot);
                    }
                }
                if tokio::time::Instant::now() >= deadline {
                    return None;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
    }
}
