//! Pipeline orchestrator.
//!
//! The engine drives a run through the fixed stage order:
//! - **Gate**: tier check before any record exists
//! - **Stages**: outline, narration, audio, strictly sequential within a run
//! - **Checkpoints**: progress and artifact links persisted after every stage
//! - **Pause/resume**: cooperative, observed between stages only
//! - **Rollback**: completed stages compensated in reverse on failure
//!
//! Independent runs execute concurrently, bounded by `max_concurrent_runs`.

pub mod checkpoints;
mod config;
mod engine;
mod types;

pub use config::OrchestratorConfig;
pub use engine::PipelineEngine;
pub use types::{OrchestratorError, PipelineOutcome, ResumeOverrides, StartRequest};
