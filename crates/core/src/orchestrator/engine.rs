//! Pipeline engine implementation.
//!
//! Drives runs through the stage sequence:
//! - Creation: tier gate, then a pending run record
//! - Execution: one stage at a time, store + cache written after each
//! - Pause: external or review, observed between stages
//! - Failure: reverse-order compensation of completed stages

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tracing::{debug, error, info, warn};

use crate::artifact::{ArtifactContent, ArtifactStore, NarrationArtifact, StoredArtifact};
use crate::metrics::{
    MetricsAggregator, PipelineMetrics, RunSummary, COMPENSATIONS, RUNS_COMPLETED, RUNS_REJECTED,
    RUN_DURATION, RUN_PAUSES, STAGE_DURATION, STAGE_EXECUTIONS,
};
use crate::run::{CreateRunRequest, Run, RunStatus, RunStore};
use crate::stage::{
    GenerationOptions, StageContext, StageInput, StageKind, StageMetadata, StageOutputs,
    StageResult, StageSet,
};
use crate::status::{StatusCache, StatusSnapshot, StatusUpdate};
use crate::tier::{self, Feature, FeatureSet};

use super::checkpoints;
use super::config::OrchestratorConfig;
use super::types::{OrchestratorError, PipelineOutcome, ResumeOverrides, StartRequest};

/// Upper bound on stale runs inspected by a single recovery pass.
const RECOVERY_BATCH: usize = 1000;

/// A pause that has been written to the store but not yet observed by the
/// executing task.
#[derive(Debug, Clone)]
struct PauseRequest {
    reason: String,
    paused_at: DateTime<Utc>,
}

/// Per-run locks.
#[derive(Default)]
struct RunSlot {
    /// Held for the whole of an `execute` or `resume`.
    execution: Mutex<()>,
    /// Held by `pause` and by every status write the executing task makes
    /// while the run is live.
    pending_pause: Mutex<Option<PauseRequest>>,
}

/// How a between-stage commit ended.
enum Commit {
    Continue,
    Paused(Run),
}

/// The pipeline engine. Construct once and share behind an `Arc`.
pub struct PipelineEngine {
    config: OrchestratorConfig,
    options: GenerationOptions,
    runs: Arc<dyn RunStore>,
    artifacts: Arc<dyn ArtifactStore>,
    stages: StageSet,
    status: StatusCache,
    metrics: MetricsAggregator,
    slots: StdMutex<HashMap<String, Arc<RunSlot>>>,
    permits: Semaphore,
}

impl PipelineEngine {
    /// Create a new engine.
    pub fn new(
        config: OrchestratorConfig,
        options: GenerationOptions,
        runs: Arc<dyn RunStore>,
        artifacts: Arc<dyn ArtifactStore>,
        stages: StageSet,
    ) -> Self {
        let permits = match config.max_concurrent_runs {
            0 => Semaphore::MAX_PERMITS,
            n => n,
        };

        Self {
            config,
            options,
            runs,
            artifacts,
            stages,
            status: StatusCache::new(),
            metrics: MetricsAggregator::new(),
            slots: StdMutex::new(HashMap::new()),
            permits: Semaphore::new(permits),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Gate the request and create a pending run. Nothing executes.
    pub async fn create_run(&self, request: StartRequest) -> Result<Run, OrchestratorError> {
        if self.permits.is_closed() {
            return Err(OrchestratorError::ShuttingDown);
        }

        if let Err(e) = tier::validate(request.tier, &request.features) {
            RUNS_REJECTED.inc();
            warn!(
                "Rejected run for owner {}: {} (tier {}, features {})",
                request.owner_id, e, request.tier, request.features
            );
            return Err(e.into());
        }

        let run = self.runs.create(CreateRunRequest {
            owner_id: request.owner_id,
            mode: request.mode,
            features: request.features,
            tier: request.tier,
            source_text: request.source_text,
        })?;
        self.status.insert(StatusSnapshot::from_run(&run)).await;

        info!(
            "Created run {} for owner {} (mode {}, features {})",
            run.id, run.owner_id, run.mode, run.requested_features
        );
        Ok(run)
    }

    /// Create a run and drive it until it succeeds, fails or pauses.
    pub async fn start(&self, request: StartRequest) -> Result<PipelineOutcome, OrchestratorError> {
        let run = self.create_run(request).await?;
        self.execute(&run.id).await
    }

    /// Create a run and execute it on a background task.
    ///
    /// Returns as soon as the run record exists; poll [`Self::status`] for
    /// progress.
    pub async fn submit(self: &Arc<Self>, request: StartRequest) -> Result<Run, OrchestratorError> {
        let run = self.create_run(request).await?;

        let engine = Arc::clone(self);
        let run_id = run.id.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.execute(&run_id).await {
                error!("Background execution of run {} failed: {}", run_id, e);
            }
        });

        Ok(run)
    }

    /// Drive a pending run.
    pub async fn execute(&self, run_id: &str) -> Result<PipelineOutcome, OrchestratorError> {
        let slot = self.slot(run_id);
        let result = self.execute_in(&slot, run_id).await;
        drop(slot);
        self.release_idle_slot(run_id);
        result
    }

    async fn execute_in(
        &self,
        slot: &RunSlot,
        run_id: &str,
    ) -> Result<PipelineOutcome, OrchestratorError> {
        let _execution = slot
            .execution
            .try_lock()
            .map_err(|_| OrchestratorError::RunBusy(run_id.to_string()))?;

        let run = self.load_run(run_id)?;
        if run.status != RunStatus::Pending {
            return Err(OrchestratorError::InvalidState {
                expected: "pending".to_string(),
                actual: run.status.state_type().to_string(),
            });
        }

        let _permit = self.acquire_permit().await?;

        let run = self
            .transition(
                run_id,
                RunStatus::Running {
                    started_at: Utc::now(),
                },
                Some("started"),
                Some(checkpoints::STARTED),
            )
            .await?;
        info!("Run {} started", run_id);

        self.drive(slot, run, StageOutputs::default(), Vec::new())
            .await
    }

    /// Ask a running run to stop before its next stage.
    ///
    /// A stage already executing runs to completion; its output is kept.
    pub async fn pause(&self, run_id: &str, reason: &str) -> Result<Run, OrchestratorError> {
        Self::require_running(&self.load_run(run_id)?)?;

        let slot = self.slot(run_id);
        let result = self.pause_in(&slot, run_id, reason).await;
        drop(slot);
        self.release_idle_slot(run_id);
        result
    }

    async fn pause_in(
        &self,
        slot: &RunSlot,
        run_id: &str,
        reason: &str,
    ) -> Result<Run, OrchestratorError> {
        let mut pending = slot.pending_pause.lock().await;

        // Re-check under the transition lock; the run may have moved on.
        Self::require_running(&self.load_run(run_id)?)?;

        let request = PauseRequest {
            reason: reason.to_string(),
            paused_at: Utc::now(),
        };
        let run = self
            .transition(
                run_id,
                RunStatus::Paused {
                    reason: request.reason.clone(),
                    paused_at: request.paused_at,
                },
                None,
                None,
            )
            .await?;
        *pending = Some(request);

        RUN_PAUSES.with_label_values(&["external"]).inc();
        info!("Run {} paused: {}", run_id, reason);
        Ok(run)
    }

    /// Continue a paused run from its first incomplete stage.
    pub async fn resume(
        &self,
        run_id: &str,
        overrides: ResumeOverrides,
    ) -> Result<PipelineOutcome, OrchestratorError> {
        let slot = self.slot(run_id);
        let result = self.resume_in(&slot, run_id, overrides).await;
        drop(slot);
        self.release_idle_slot(run_id);
        result
    }

    async fn resume_in(
        &self,
        slot: &RunSlot,
        run_id: &str,
        overrides: ResumeOverrides,
    ) -> Result<PipelineOutcome, OrchestratorError> {
        let _execution = slot
            .execution
            .try_lock()
            .map_err(|_| OrchestratorError::RunBusy(run_id.to_string()))?;

        let run = self.load_run(run_id)?;
        if !run.status.is_paused() {
            return Err(OrchestratorError::InvalidState {
                expected: "paused".to_string(),
                actual: run.status.state_type().to_string(),
            });
        }

        let _permit = self.acquire_permit().await?;

        let (mut outputs, mut completed) = self.load_outputs(&run)?;
        if let Some(narration) = overrides.edited_narration {
            self.apply_edited_narration(&run, narration, &mut outputs, &mut completed)?;
            // Audio rendered from the old narration no longer matches.
            self.discard_output(&run.id, StageKind::Audio, &mut outputs, &mut completed)
                .await;
        }

        let run = {
            let mut pending = slot.pending_pause.lock().await;
            pending.take();
            self.transition(
                run_id,
                RunStatus::Running {
                    started_at: Utc::now(),
                },
                Some("resumed"),
                None,
            )
            .await?
        };
        info!(
            "Run {} resumed with {} completed stage(s)",
            run_id,
            completed.len()
        );

        self.drive(slot, run, outputs, completed).await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current status, served from the cache when possible.
    ///
    /// A miss (e.g. after a restart) rebuilds the snapshot from the run
    /// record and repopulates the cache.
    pub async fn status(&self, run_id: &str) -> Result<StatusSnapshot, OrchestratorError> {
        if let Some(snapshot) = self.status.get(run_id).await {
            return Ok(snapshot);
        }

        let run = self.load_run(run_id)?;
        let snapshot = StatusSnapshot::from_run(&run);
        self.status.insert(snapshot.clone()).await;
        debug!("Status cache repopulated for run {}", run_id);
        Ok(snapshot)
    }

    /// Drop a run's cached status. Returns whether an entry existed.
    pub async fn cleanup_status(&self, run_id: &str) -> bool {
        self.status.delete(run_id).await
    }

    pub fn get_run(&self, run_id: &str) -> Result<Run, OrchestratorError> {
        self.load_run(run_id)
    }

    /// An owner's runs, newest first.
    pub fn list_runs(
        &self,
        owner_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Run>, OrchestratorError> {
        let limit = limit.unwrap_or(self.config.default_list_limit);
        Ok(self.runs.list_by_owner(owner_id, limit)?)
    }

    /// Artifacts currently stored for a run.
    pub fn list_artifacts(&self, run_id: &str) -> Result<Vec<StoredArtifact>, OrchestratorError> {
        self.load_run(run_id)?;
        Ok(self.artifacts.list_by_run(run_id, None)?)
    }

    /// Number of runs, optionally only those in one state.
    pub fn count_runs(&self, state_type: Option<&str>) -> Result<u64, OrchestratorError> {
        Ok(self.runs.count(state_type)?)
    }

    pub fn metrics(&self) -> PipelineMetrics {
        self.metrics.snapshot()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Fail runs a previous process left in `running`.
    ///
    /// Call once at startup, before accepting work. Their stage tasks died
    /// with that process, so nothing will ever move them forward.
    pub async fn recover_interrupted_runs(&self) -> Result<usize, OrchestratorError> {
        let stale = self.runs.list_by_status("running", RECOVERY_BATCH)?;
        let mut recovered = 0;

        for run in stale {
            if self.is_executing(&run.id) {
                continue;
            }

            let failed = RunStatus::Failed {
                error_message: "run interrupted before completion".to_string(),
                error_detail: Some(format!("last step: {}", run.current_step)),
                failed_at: Utc::now(),
            };
            match self.transition(&run.id, failed, Some("failed"), None).await {
                Ok(run) => {
                    self.record_finished(&run, false);
                    recovered += 1;
                    warn!("Recovered interrupted run {}", run.id);
                }
                Err(e) => error!("Failed to recover run {}: {}", run.id, e),
            }
        }

        if recovered > 0 {
            info!("Marked {} interrupted run(s) as failed", recovered);
        }
        Ok(recovered)
    }

    /// Stop accepting executions. Runs already executing finish normally.
    pub fn shutdown(&self) {
        self.permits.close();
        info!("Pipeline engine stopped accepting work");
    }

    // =========================================================================
    // Stage sequencing
    // =========================================================================

    async fn drive(
        &self,
        slot: &RunSlot,
        run: Run,
        mut outputs: StageOutputs,
        mut completed: Vec<StageResult>,
    ) -> Result<PipelineOutcome, OrchestratorError> {
        let run_id = run.id.clone();
        let ctx = StageContext {
            run_id: run_id.clone(),
            options: self.options.clone(),
        };

        for stage in plan_stages(&run.requested_features) {
            if outputs.has(stage) {
                debug!("Run {}: {} output present, skipping", run_id, stage);
                continue;
            }

            {
                let mut pending = slot.pending_pause.lock().await;
                if pending.take().is_some() {
                    drop(pending);
                    return self.paused_outcome(&run_id, outputs);
                }
                self.transition(
                    &run_id,
                    RunStatus::Running {
                        started_at: run_started_at(&run),
                    },
                    Some(stage.running_step()),
                    None,
                )
                .await?;
            }

            if !run.requested_features.contains(stage.feature()) {
                info!("Run {}: backfilling missing {} output", run_id, stage);
            }

            let executor = self.stages.get(stage);
            let input = StageInput {
                source_text: &run.source_text,
                outputs: &outputs,
            };

            if let Err(e) = executor.validate_input(&input) {
                STAGE_EXECUTIONS
                    .with_label_values(&[stage.as_str(), "invalid_input"])
                    .inc();
                warn!("Run {}: {} input rejected: {}", run_id, stage, e);
                return self
                    .fail(slot, &run_id, outputs, &completed, e.to_string())
                    .await;
            }

            debug!("Run {}: executing {}", run_id, stage);
            let result = match executor.execute(&ctx, &input).await {
                Ok(result) => result,
                Err(e) => {
                    STAGE_EXECUTIONS
                        .with_label_values(&[stage.as_str(), "failed"])
                        .inc();
                    warn!("Run {}: {} failed: {}", run_id, stage, e);
                    return self
                        .fail(slot, &run_id, outputs, &completed, e.to_string())
                        .await;
                }
            };

            STAGE_EXECUTIONS
                .with_label_values(&[stage.as_str(), "success"])
                .inc();
            STAGE_DURATION
                .with_label_values(&[stage.as_str()])
                .observe(result.duration_ms as f64 / 1000.0);
            info!(
                "Run {}: {} complete in {}ms (artifact {})",
                run_id, stage, result.duration_ms, result.artifact_id
            );

            self.runs
                .link_artifact(&run_id, stage, &result.artifact_id)?;
            outputs.set(result.output.clone());
            completed.push(result);

            let review = stage == StageKind::Narration
                && run.mode.pauses_for_review()
                && run.requested_features.contains(Feature::Audio);

            if let Commit::Paused(paused) = self.commit_stage(slot, &run, stage, review).await? {
                return Ok(PipelineOutcome::from_run(&paused, outputs, Vec::new()));
            }
        }

        self.finish(slot, &run, outputs).await
    }

    /// Persist a completed stage's checkpoint, or the pause that replaces it.
    async fn commit_stage(
        &self,
        slot: &RunSlot,
        run: &Run,
        stage: StageKind,
        review: bool,
    ) -> Result<Commit, OrchestratorError> {
        let mut pending = slot.pending_pause.lock().await;

        if let Some(request) = pending.take() {
            // An external pause landed while the stage ran.
            let paused = self
                .transition(
                    &run.id,
                    RunStatus::Paused {
                        reason: request.reason,
                        paused_at: request.paused_at,
                    },
                    Some(stage.completed_step()),
                    Some(stage.checkpoint()),
                )
                .await?;
            info!("Run {} paused after {}", run.id, stage);
            return Ok(Commit::Paused(paused));
        }

        if review {
            let reason = self.config.review_pause_reason.clone();
            let paused = self
                .transition(
                    &run.id,
                    RunStatus::Paused {
                        reason: reason.clone(),
                        paused_at: Utc::now(),
                    },
                    Some(&reason),
                    Some(stage.checkpoint()),
                )
                .await?;
            RUN_PAUSES.with_label_values(&["review"]).inc();
            info!("Run {} paused for review after {}", run.id, stage);
            return Ok(Commit::Paused(paused));
        }

        self.transition(
            &run.id,
            RunStatus::Running {
                started_at: run_started_at(run),
            },
            Some(stage.completed_step()),
            Some(stage.checkpoint()),
        )
        .await?;
        Ok(Commit::Continue)
    }

    async fn finish(
        &self,
        slot: &RunSlot,
        run: &Run,
        outputs: StageOutputs,
    ) -> Result<PipelineOutcome, OrchestratorError> {
        let mut pending = slot.pending_pause.lock().await;
        if pending.take().is_some() {
            drop(pending);
            return self.paused_outcome(&run.id, outputs);
        }

        self.transition(
            &run.id,
            RunStatus::Running {
                started_at: run_started_at(run),
            },
            Some("finalizing"),
            Some(checkpoints::FINALIZING),
        )
        .await?;
        let done = self
            .transition(
                &run.id,
                RunStatus::Succeeded {
                    completed_at: Utc::now(),
                },
                Some("complete"),
                Some(checkpoints::COMPLETE),
            )
            .await?;
        drop(pending);

        self.record_finished(&done, true);
        info!("Run {} succeeded", run.id);

        Ok(PipelineOutcome::from_run(&done, outputs, Vec::new()))
    }

    async fn fail(
        &self,
        slot: &RunSlot,
        run_id: &str,
        outputs: StageOutputs,
        completed: &[StageResult],
        message: String,
    ) -> Result<PipelineOutcome, OrchestratorError> {
        let notes = self.rollback(run_id, completed).await;
        let detail = if notes.is_empty() {
            None
        } else {
            Some(notes.join("; "))
        };

        let failed = {
            let mut pending = slot.pending_pause.lock().await;
            pending.take();
            self.transition(
                run_id,
                RunStatus::Failed {
                    error_message: message.clone(),
                    error_detail: detail,
                    failed_at: Utc::now(),
                },
                Some("failed"),
                None,
            )
            .await?
        };

        self.record_finished(&failed, false);
        error!("Run {} failed: {}", run_id, message);

        let mut errors = vec![message];
        errors.extend(notes);
        Ok(PipelineOutcome::from_run(&failed, outputs, errors))
    }

    /// Compensate completed stages, most recent first.
    ///
    /// Returns a note per compensation that did not fully succeed. Nothing
    /// here is fatal.
    async fn rollback(&self, run_id: &str, completed: &[StageResult]) -> Vec<String> {
        let mut notes = Vec::new();

        for result in completed.iter().rev() {
            if let Err(note) = self.compensate(run_id, result).await {
                notes.push(note);
            }
        }

        notes
    }

    /// Undo one completed stage and unlink its artifact.
    async fn compensate(&self, run_id: &str, result: &StageResult) -> Result<(), String> {
        let stage = result.stage;
        debug!("Run {}: compensating {}", run_id, stage);

        if let Err(e) = self.stages.get(stage).compensate(result).await {
            COMPENSATIONS
                .with_label_values(&[stage.as_str(), "failed"])
                .inc();
            warn!("Run {}: {}", run_id, e);
            return Err(e.to_string());
        }

        COMPENSATIONS
            .with_label_values(&[stage.as_str(), "success"])
            .inc();
        self.runs.unlink_artifact(run_id, stage).map_err(|e| {
            warn!("Run {}: failed to unlink {} artifact: {}", run_id, stage, e);
            format!("unlink of {} artifact failed: {}", stage, e)
        })?;
        Ok(())
    }

    /// Drop a completed stage's output so the stage runs again.
    ///
    /// A failed compensation leaves the old artifact behind; the stage still
    /// re-runs and links its new output in place of the old one.
    async fn discard_output(
        &self,
        run_id: &str,
        stage: StageKind,
        outputs: &mut StageOutputs,
        completed: &mut Vec<StageResult>,
    ) {
        let Some(index) = completed.iter().position(|result| result.stage == stage) else {
            return;
        };

        let result = completed.remove(index);
        if let Err(note) = self.compensate(run_id, &result).await {
            warn!("Run {}: stale {} output kept: {}", run_id, stage, note);
        }
        outputs.clear(stage);
        info!("Run {}: {} output discarded, it will be regenerated", run_id, stage);
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Write a status change to the store, then mirror it into the cache.
    async fn transition(
        &self,
        run_id: &str,
        status: RunStatus,
        current_step: Option<&str>,
        progress: Option<u8>,
    ) -> Result<Run, OrchestratorError> {
        let run = self
            .runs
            .update_status(run_id, status, current_step, progress)?;
        self.status
            .update(run_id, StatusUpdate::from_run(&run))
            .await;
        debug!(
            "Run {} -> {} ({}, {}%)",
            run_id,
            run.status.state_type(),
            run.current_step,
            run.progress
        );
        Ok(run)
    }

    fn paused_outcome(
        &self,
        run_id: &str,
        outputs: StageOutputs,
    ) -> Result<PipelineOutcome, OrchestratorError> {
        let run = self.load_run(run_id)?;
        info!("Run {} observed pause request", run_id);
        Ok(PipelineOutcome::from_run(&run, outputs, Vec::new()))
    }

    /// Rebuild outputs and stage results from the artifacts a run links.
    fn load_outputs(
        &self,
        run: &Run,
    ) -> Result<(StageOutputs, Vec<StageResult>), OrchestratorError> {
        let mut outputs = StageOutputs::default();
        let mut completed = Vec::new();

        for stage in StageKind::ORDER {
            let Some(artifact_id) = run.linked_artifacts.get(stage) else {
                continue;
            };
            match self.artifacts.get(artifact_id)? {
                Some(stored) => {
                    outputs.set(stored.content.clone());
                    completed.push(stored_result(stored));
                }
                None => warn!(
                    "Run {}: linked {} artifact {} is missing, it will be regenerated",
                    run.id, stage, artifact_id
                ),
            }
        }

        Ok((outputs, completed))
    }

    /// Persist an edited narration in place of the stored one.
    fn apply_edited_narration(
        &self,
        run: &Run,
        narration: NarrationArtifact,
        outputs: &mut StageOutputs,
        completed: &mut Vec<StageResult>,
    ) -> Result<(), OrchestratorError> {
        let content = ArtifactContent::Narration(narration.clone());
        let existing = completed
            .iter_mut()
            .find(|result| result.stage == StageKind::Narration);

        match existing {
            Some(result) => {
                let stored = self.artifacts.replace(&result.artifact_id, content)?;
                *result = stored_result(stored);
            }
            None => {
                let stored = self.artifacts.put(&run.id, content)?;
                self.runs
                    .link_artifact(&run.id, StageKind::Narration, &stored.id)?;
                completed.push(stored_result(stored));
            }
        }

        outputs.narration = Some(narration);
        info!("Run {}: narration replaced by edited version", run.id);
        Ok(())
    }

    fn record_finished(&self, run: &Run, success: bool) {
        let duration = (Utc::now() - run.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        let result = if success { "succeeded" } else { "failed" };

        RUNS_COMPLETED
            .with_label_values(&[result, run.mode.as_str()])
            .inc();
        RUN_DURATION
            .with_label_values(&[result])
            .observe(duration.as_secs_f64());

        self.metrics.record(&RunSummary {
            mode: run.mode,
            features: run.requested_features.clone(),
            success,
            duration,
        });
    }

    fn load_run(&self, run_id: &str) -> Result<Run, OrchestratorError> {
        self.runs
            .get(run_id)?
            .ok_or_else(|| OrchestratorError::RunNotFound(run_id.to_string()))
    }

    fn require_running(run: &Run) -> Result<(), OrchestratorError> {
        if run.status.is_running() {
            Ok(())
        } else {
            Err(OrchestratorError::InvalidState {
                expected: "running".to_string(),
                actual: run.status.state_type().to_string(),
            })
        }
    }

    async fn acquire_permit(&self) -> Result<SemaphorePermit<'_>, OrchestratorError> {
        self.permits
            .acquire()
            .await
            .map_err(|_| OrchestratorError::ShuttingDown)
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<RunSlot>>> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn slot(&self, run_id: &str) -> Arc<RunSlot> {
        Arc::clone(self.slots().entry(run_id.to_string()).or_default())
    }

    /// Forget a run's locks once no caller holds them.
    ///
    /// Every pending pause is consumed by the task that holds the slot, so an
    /// unreferenced slot carries no state and is recreated on demand.
    fn release_idle_slot(&self, run_id: &str) {
        let mut slots = self.slots();
        if slots
            .get(run_id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(run_id);
        }
    }

    fn is_executing(&self, run_id: &str) -> bool {
        self.slots()
            .get(run_id)
            .map(|slot| slot.execution.try_lock().is_err())
            .unwrap_or(false)
    }
}

/// Stages to run, in order: everything requested plus any prerequisite a
/// later requested stage consumes.
fn plan_stages(features: &FeatureSet) -> Vec<StageKind> {
    let Some(last) = features.last().map(StageKind::from_feature) else {
        return Vec::new();
    };

    StageKind::ORDER
        .into_iter()
        .filter(|stage| *stage <= last)
        .collect()
}

fn run_started_at(run: &Run) -> DateTime<Utc> {
    match &run.status {
        RunStatus::Running { started_at } => *started_at,
        _ => run.created_at,
    }
}

fn stored_result(stored: StoredArtifact) -> StageResult {
    StageResult {
        stage: stored.kind(),
        metadata: StageMetadata::describe(&stored.content),
        artifact_id: stored.id,
        output: stored.content,
        duration_ms: 0,
    }
}
