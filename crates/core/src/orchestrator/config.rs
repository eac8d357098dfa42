//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the pipeline engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum runs executing at once (0 = unlimited).
    /// Runs over the limit wait for a slot before their first stage.
    #[serde(default)]
    pub max_concurrent_runs: usize,

    /// Pause reason (and step label) written when a hybrid or manual run
    /// stops for review after narration.
    #[serde(default = "default_review_pause_reason")]
    pub review_pause_reason: String,

    /// Page size used when listing runs without an explicit limit.
    #[serde(default = "default_list_limit")]
    pub default_list_limit: usize,

    /// Mark runs left in `running` by a previous process as failed on startup.
    #[serde(default = "default_recover_on_startup")]
    pub recover_on_startup: bool,
}

fn default_review_pause_reason() -> String {
    "review_required".to_string()
}

fn default_list_limit() -> usize {
    50
}

fn default_recover_on_startup() -> bool {
    true
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 0,
            review_pause_reason: default_review_pause_reason(),
            default_list_limit: default_list_limit(),
            recover_on_startup: default_recover_on_startup(),
        }
    }
}
