//! In-process run metrics.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::run::RunMode;
use crate::tier::FeatureSet;

/// What the aggregator needs to know about a finished run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub mode: RunMode,
    pub features: FeatureSet,
    pub success: bool,
    pub duration: Duration,
}

/// Totals across every run this process has finished.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipelineMetrics {
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    /// Mean run duration in milliseconds.
    pub average_processing_time: f64,
    pub by_mode: BTreeMap<String, u64>,
    pub by_feature: BTreeMap<String, u64>,
}

/// Accumulates [`PipelineMetrics`]. Not persisted: a restart starts from zero.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    inner: Mutex<PipelineMetrics>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a finished run into the totals.
    pub fn record(&self, summary: &RunSummary) {
        let mut metrics = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        metrics.total_executions += 1;
        if summary.success {
            metrics.successful_executions += 1;
        } else {
            metrics.failed_executions += 1;
        }

        let n = metrics.total_executions as f64;
        let duration_ms = summary.duration.as_secs_f64() * 1000.0;
        metrics.average_processing_time =
            (metrics.average_processing_time * (n - 1.0) + duration_ms) / n;

        *metrics
            .by_mode
            .entry(summary.mode.as_str().to_string())
            .or_insert(0) += 1;
        for feature in summary.features.iter() {
            *metrics
                .by_feature
                .entry(feature.as_str().to_string())
                .or_insert(0) += 1;
        }
    }

    /// A copy of the current totals.
    pub fn snapshot(&self) -> PipelineMetrics {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
