use deckcast_core::{Config, PipelineEngine};
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    config: Config,
    engine: Arc<PipelineEngine>,
}

impl AppState {
    pub fn new(config: Config, engine: Arc<PipelineEngine>) -> Self {
        Self { config, engine }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &Arc<PipelineEngine> {
        &self.engine
    }
}
