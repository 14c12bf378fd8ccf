use crate::pipeline::PipelineExecutor;
use crate::run::{JobRun, RunStatus};
use crate::store::RunStore;
use alerts::AlertService;
use catalog::{Catalog, EntityCount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

pub const DEFAULT_RECENT_RUNS: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemHealth {
    Starting,
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulerStatus {
    Running,
    Online,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunCounts {
    pub total: usize,
    pub succeeded: usize,
    /// ERROR and ABORTED
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecordTotals {
    pub processed: usize,
    pub success: usize,
    pub error: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub id: String,
    pub job_id: String,
    pub job_name: String,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub records_processed: usize,
}

impl From<&JobRun> for RunSummary {
    fn from(run: &JobRun) -> Self {
        Self {
            id: run.id.clone(),
            job_id: run.job_id.clone(),
            job_name: run.job_name.clone(),
            status: run.status,
            start_time: run.start_time,
            end_time: run.end_time,
            records_processed: run.metrics.records_processed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatusSnapshot {
    pub status: SystemHealth,
    pub scheduler_status: SchedulerStatus,
    pub jobs: EntityCount,
    /// `enabled` counts active sources
    pub data_sources: EntityCount,
    pub transformations: EntityCount,
    /// distinct jobs with a RUNNING run
    pub running_jobs: usize,
    pub runs: RunCounts,
    pub records: RecordTotals,
    /// newest first
    pub recent_runs: Vec<RunSummary>,
    pub unacknowledged_alerts: usize,
}

/// Derives the system health view from the catalog, the run store and the
/// alert feed. Holds no state of its own.
#[derive(Clone)]
pub struct SystemStatusAggregator {
    catalog: Arc<dyn Catalog>,
    runs: Arc<dyn RunStore>,
    alerts: AlertService,
    recent_runs: usize,
}

impl SystemStatusAggregator {
    pub fn new(catalog: Arc<dyn Catalog>, runs: Arc<dyn RunStore>, alerts: AlertService) -> Self {
        Self {
            catalog,
            runs,
            alerts,
            recent_runs: DEFAULT_RECENT_RUNS,
        }
    }

    pub fn for_executor(executor: &PipelineExecutor) -> Self {
        Self::new(
            executor.catalog().clone(),
            executor.run_store().clone(),
            executor.alerts().clone(),
        )
    }

    pub fn with_recent_runs(mut self, recent_runs: usize) -> Self {
        self.recent_runs = recent_runs;
        self
    }

    pub fn snapshot(&self) -> SystemStatusSnapshot {
        let counts = self.catalog.counts();
        let runs = self.runs.list();

        let mut run_counts = RunCounts {
            total: runs.len(),
            ..Default::default()
        };
        let mut records = RecordTotals::default();
        let mut running = BTreeSet::new();
        for run in &runs {
            match run.status {
                RunStatus::Success => run_counts.succeeded += 1,
                RunStatus::Error | RunStatus::Aborted => run_counts.failed += 1,
                RunStatus::Running => {
                    running.insert(run.job_id.as_str());
                }
            }
            records.processed += run.metrics.records_processed;
            records.success += run.metrics.records_success;
            records.error += run.metrics.records_error;
            records.skipped += run.metrics.records_skipped;
        }

        let status = if counts.jobs.total == 0 && counts.data_sources.total == 0 {
            SystemHealth::Starting
        } else if run_counts.failed > run_counts.succeeded {
            SystemHealth::Degraded
        } else {
            SystemHealth::Healthy
        };
        let scheduler_status = if running.is_empty() {
            SchedulerStatus::Online
        } else {
            SchedulerStatus::Running
        };

        let mut recent: Vec<&JobRun> = runs.iter().rev().collect();
        recent.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        let recent_runs = recent
            .into_iter()
            .take(self.recent_runs)
            .map(RunSummary::from)
            .collect();

        SystemStatusSnapshot {
            status,
            scheduler_status,
            jobs: counts.jobs,
            data_sources: counts.data_sources,
            transformations: counts.transformations,
            running_jobs: running.len(),
            runs: run_counts,
            records,
            recent_runs,
            unacknowledged_alerts: self.alerts.unacknowledged_count(),
        }
    }
}
