//! End-to-end tests against the SQLite stores and template generators.

use std::sync::Arc;

use tempfile::TempDir;

use deckcast_core::{
    testing::fixtures, ArtifactContent, ArtifactStore, Feature, GenerationOptions,
    OrchestratorConfig, PipelineEngine, ResumeOverrides, RunMode, SqliteArtifactStore,
    SqliteRunStore, StageKind, StageSet, StartRequest, TemplateAudioGenerator,
    TemplateNarrationGenerator, TemplateOutlineGenerator, Tier,
};

const SOURCE: &str = "# Rust in Production\n\n\
Ownership rules keep memory safe. Every value has one owner. Borrowing lends access.\n\n\
Async Rust scales IO-bound services. Futures are lazy. Executors drive them.\n\n\
Tooling keeps teams fast. Cargo builds and tests. Clippy catches mistakes.";

/// Test helper wiring the engine to SQLite stores in a temp directory.
struct TestHarness {
    engine: Arc<PipelineEngine>,
    artifacts: Arc<SqliteArtifactStore>,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let runs = Arc::new(SqliteRunStore::new(&db_path).expect("Failed to create run store"));
        let artifacts = Arc::new(
            SqliteArtifactStore::new(&db_path).expect("Failed to create artifact store"),
        );

        let stages = StageSet::from_generators(
            Arc::new(TemplateOutlineGenerator::new()),
            Arc::new(TemplateNarrationGenerator::new()),
            Arc::new(TemplateAudioGenerator::new()),
            artifacts.clone(),
        );
        let engine = Arc::new(PipelineEngine::new(
            OrchestratorConfig::default(),
            GenerationOptions::default(),
            runs,
            artifacts.clone(),
            stages,
        ));

        Self {
            engine,
            artifacts,
            _temp_dir: temp_dir,
        }
    }

    fn request(&self, mode: RunMode) -> StartRequest {
        let mut request = fixtures::start_request(Tier::Premium, mode, &Feature::ALL);
        request.source_text = SOURCE.to_string();
        request
    }
}

#[tokio::test]
async fn test_template_pipeline_runs_to_completion() {
    let harness = TestHarness::new();

    let outcome = harness
        .engine
        .start(harness.request(RunMode::Auto))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.progress, 100);

    let outline = outcome.outputs.outline.as_ref().unwrap();
    assert_eq!(outline.title, "Rust in Production");
    assert_eq!(outline.slides.len(), 3);

    let narration = outcome.outputs.narration.as_ref().unwrap();
    assert_eq!(narration.segments.len(), 3);

    let audio = outcome.outputs.audio.as_ref().unwrap();
    assert_eq!(audio.segments.len(), 3);
    assert!(audio.total_duration_ms > 0);
    assert!(audio.uri.starts_with("synthetic://"));

    let stored = harness.engine.list_artifacts(&outcome.run_id).unwrap();
    let kinds: Vec<StageKind> = stored.iter().map(|a| a.kind()).collect();
    assert_eq!(
        kinds,
        vec![StageKind::Outline, StageKind::Narration, StageKind::Audio]
    );
}

#[tokio::test]
async fn test_review_round_trip_persists_edit() {
    let harness = TestHarness::new();

    let paused = harness
        .engine
        .start(harness.request(RunMode::Hybrid))
        .await
        .unwrap();
    assert!(paused.is_paused());
    assert_eq!(paused.progress, 45);

    let edited = fixtures::edited_narration();
    let outcome = harness
        .engine
        .resume(
            &paused.run_id,
            ResumeOverrides {
                edited_narration: Some(edited.clone()),
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.status, "succeeded");

    let run = harness.engine.get_run(&paused.run_id).unwrap();
    let narration_id = run.linked_artifacts.get(StageKind::Narration).unwrap();
    let stored = harness.artifacts.get(narration_id).unwrap().unwrap();
    assert_eq!(stored.content, ArtifactContent::Narration(edited.clone()));

    // Audio timing follows the edited script, one segment per edited line.
    let audio = outcome.outputs.audio.unwrap();
    assert_eq!(audio.segments.len(), edited.segments.len());
}

#[tokio::test]
async fn test_runs_survive_a_new_engine() {
    let harness = TestHarness::new();
    let outcome = harness
        .engine
        .start(harness.request(RunMode::Auto))
        .await
        .unwrap();

    // A fresh cache still answers from the store.
    assert!(harness.engine.cleanup_status(&outcome.run_id).await);
    let status = harness.engine.status(&outcome.run_id).await.unwrap();
    assert_eq!(status.status, "succeeded");
    assert_eq!(status.progress, 100);
}
