pub mod artifact;
pub mod config;
pub mod metrics;
pub mod orchestrator;
pub mod persistence;
pub mod run;
pub mod stage;
pub mod status;
pub mod testing;
pub mod tier;

pub use artifact::{
    ArtifactContent, ArtifactStore, AudioArtifact, NarrationArtifact, OutlineArtifact,
    SqliteArtifactStore, StoredArtifact,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    ServerConfig,
};
pub use metrics::{MetricsAggregator, PipelineMetrics};
pub use orchestrator::{
    OrchestratorConfig, OrchestratorError, PipelineEngine, PipelineOutcome, ResumeOverrides,
    StartRequest,
};
pub use persistence::PersistenceError;
pub use run::{CreateRunRequest, Run, RunMode, RunStatus, RunStore, SqliteRunStore};
pub use stage::{
    GenerationOptions, StageKind, StageOutputs, StageSet, TemplateAudioGenerator,
    TemplateNarrationGenerator, TemplateOutlineGenerator,
};
pub use status::{StatusCache, StatusSnapshot};
pub use tier::{Feature, FeatureSet, Tier, TierError};
