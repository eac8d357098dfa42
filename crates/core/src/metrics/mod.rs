//! Pipeline metrics.
//!
//! Two views of the same events:
//! - [`MetricsAggregator`]: in-process totals and averages, reported by the API
//! - Prometheus collectors below, scraped by the server's `/metrics` endpoint

mod aggregator;

pub use aggregator::{MetricsAggregator, PipelineMetrics, RunSummary};

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Runs
// =============================================================================

/// Runs that reached a terminal state, by result.
pub static RUNS_COMPLETED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("deckcast_runs_completed_total", "Runs that reached a terminal state"),
        &["result", "mode"], // result: "succeeded", "failed"
    )
    .unwrap()
});

/// Runs rejected by the tier gate.
pub static RUNS_REJECTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "deckcast_runs_rejected_total",
        "Run requests rejected by the tier gate",
    )
    .unwrap()
});

/// End-to-end run duration in seconds.
pub static RUN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("deckcast_run_duration_seconds", "Duration of runs")
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0]),
        &["result"],
    )
    .unwrap()
});

/// Pauses, by who asked for them.
pub static RUN_PAUSES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("deckcast_run_pauses_total", "Runs paused"),
        &["source"], // "review", "external"
    )
    .unwrap()
});

// =============================================================================
// Stages
// =============================================================================

/// Stage executions by stage and result.
pub static STAGE_EXECUTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("deckcast_stage_executions_total", "Stage executions"),
        &["stage", "result"], // result: "success", "invalid_input", "failed"
    )
    .unwrap()
});

/// Stage execution duration in seconds.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("deckcast_stage_duration_seconds", "Duration of stage execution")
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0, 600.0]),
        &["stage"],
    )
    .unwrap()
});

/// Compensation attempts by stage and result.
pub static COMPENSATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("deckcast_compensations_total", "Stage compensation attempts"),
        &["stage", "result"], // result: "success", "failed"
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(RUNS_COMPLETED.clone()),
        Box::new(RUNS_REJECTED.clone()),
        Box::new(RUN_DURATION.clone()),
        Box::new(RUN_PAUSES.clone()),
        Box::new(STAGE_EXECUTIONS.clone()),
        Box::new(STAGE_DURATION.clone()),
        Box::new(COMPENSATIONS.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        STAGE_EXECUTIONS
            .with_label_values(&["outline", "success"])
            .inc();
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"deckcast_stage_executions_total".to_string()));
    }
}
