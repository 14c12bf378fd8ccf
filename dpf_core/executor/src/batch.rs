use crate::pipeline::PipelineExecutor;
use crate::run::{JobRunResult, RunStatus};
use crate::ExecutorError;
use alerts::{AlertSeverity, NewAlert};
use common::types::{EntityKind, EntityRef};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchJobResult {
    pub job_id: String,
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_run_id: Option<String>,
}

impl BatchJobResult {
    fn from_outcome(job_id: &str, outcome: Result<JobRunResult, ExecutorError>) -> Self {
        match outcome {
            Ok(result) => Self {
                job_id: job_id.to_string(),
                success: result.status == RunStatus::Success,
                message: result.message,
                job_run_id: Some(result.job_run_id),
            },
            Err(err) => Self {
                job_id: job_id.to_string(),
                success: false,
                message: err.message().to_string(),
                job_run_id: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchExecutionResult {
    pub total_jobs: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// one entry per requested job, in request order
    pub results: Vec<BatchJobResult>,
}

/// Executes a list of jobs and reports per-job outcomes.
///
/// Sequential unless built `with_concurrency(n > 1)`; concurrent runs that
/// share a data source still serialise on the executor's source locks.
#[derive(Clone)]
pub struct BatchCoordinator {
    executor: PipelineExecutor,
    concurrency: usize,
}

impl BatchCoordinator {
    pub fn new(executor: PipelineExecutor) -> Self {
        Self {
            executor,
            concurrency: 1,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn execute_batch_jobs(&self, job_ids: &[impl AsRef<str>]) -> BatchExecutionResult {
        let ids: Vec<String> = job_ids.iter().map(|id| id.as_ref().to_string()).collect();
        log::info!("executing batch of {} jobs", ids.len());

        let results = if self.concurrency <= 1 {
            self.run_sequential(&ids).await
        } else {
            self.run_concurrent(&ids).await
        };

        let success_count = results.iter().filter(|r| r.success).count();
        let summary = BatchExecutionResult {
            total_jobs: ids.len(),
            success_count,
            failure_count: results.len() - success_count,
            results,
        };
        self.announce(&summary);
        summary
    }

    async fn run_sequential(&self, ids: &[String]) -> Vec<BatchJobResult> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let outcome = self.executor.execute_job(id).await;
            if let Err(e) = &outcome {
                log::warn!("job {id} failed before running: {e}");
            }
            results.push(BatchJobResult::from_outcome(id, outcome));
        }
        results
    }

    async fn run_concurrent(&self, ids: &[String]) -> Vec<BatchJobResult> {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        for (index, id) in ids.iter().cloned().enumerate() {
            let executor = self.executor.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                // the semaphore is never closed
                let _permit = permits.acquire_owned().await.ok();
                let outcome = executor.execute_job(&id).await;
                (index, BatchJobResult::from_outcome(&id, outcome))
            });
        }

        let mut slots: Vec<Option<BatchJobResult>> = vec![None; ids.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => log::error!("batch task did not complete: {e}"),
            }
        }

        slots
            .into_iter()
            .zip(ids)
            .map(|(slot, id)| {
                slot.unwrap_or_else(|| BatchJobResult {
                    job_id: id.clone(),
                    success: false,
                    message: "job task did not complete".to_string(),
                    job_run_id: None,
                })
            })
            .collect()
    }

    fn announce(&self, summary: &BatchExecutionResult) {
        let severity = if summary.failure_count > 0 {
            AlertSeverity::Warning
        } else {
            AlertSeverity::Success
        };
        self.executor.alerts().emit(
            NewAlert::new(
                severity,
                "batch-coordinator",
                "batch",
                format!(
                    "Batch execution finished: {} of {} jobs succeeded",
                    summary.success_count, summary.total_jobs
                ),
            )
            .with_details(json!({
                "totalJobs": summary.total_jobs,
                "successCount": summary.success_count,
                "failureCount": summary.failure_count,
                "failedJobs": summary
                    .results
                    .iter()
                    .filter(|r| !r.success)
                    .map(|r| r.job_id.as_str())
                    .collect::<Vec<_>>(),
            }))
            .related_to(EntityRef::new(EntityKind::Batch, Uuid::new_v4().to_string())),
        );
    }
}
