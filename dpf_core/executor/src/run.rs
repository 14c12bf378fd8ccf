use crate::ExecutorError;
use catalog::Job;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Success,
    Error,
    Aborted,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    pub fn is_failure(self) -> bool {
        matches!(self, RunStatus::Error | RunStatus::Aborted)
    }
}

impl Display for RunStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "RUNNING"),
            RunStatus::Success => write!(f, "SUCCESS"),
            RunStatus::Error => write!(f, "ERROR"),
            RunStatus::Aborted => write!(f, "ABORTED"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunMetrics {
    /// records extracted from all sources
    pub records_processed: usize,
    /// records handed to the load phase
    pub records_success: usize,
    /// failed units of work: sources, transformations and destinations
    pub records_error: usize,
    /// records dropped by data validation
    pub records_skipped: usize,
    pub execution_time_ms: u64,
    pub progress: u8,
}

/// One execution attempt of a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobRun {
    pub id: String,
    pub job_id: String,
    pub job_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub error: Option<String>,
    pub metrics: RunMetrics,
    pub logs: Vec<LogEntry>,
}

impl JobRun {
    pub fn start(job: &Job) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            job_id: job.id.clone(),
            job_name: job.name.clone(),
            start_time: Utc::now(),
            end_time: None,
            status: RunStatus::Running,
            error: None,
            metrics: RunMetrics::default(),
            logs: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    // the wall clock may step back; entries never do
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        let floor = self
            .logs
            .last()
            .map(|l| l.timestamp)
            .unwrap_or(self.start_time);
        now.max(floor)
    }

    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info => log::info!("[run {}] {message}", self.id),
            LogLevel::Warning => log::warn!("[run {}] {message}", self.id),
            LogLevel::Error => log::error!("[run {}] {message}", self.id),
        }
        let timestamp = self.next_timestamp();
        self.logs.push(LogEntry {
            timestamp,
            level,
            message,
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message)
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Error, message)
    }

    pub fn set_progress(&mut self, progress: u8) {
        self.metrics.progress = progress.min(100);
    }

    /// Move a running run to a terminal status.
    pub fn finish(&mut self, status: RunStatus, error: Option<String>) -> Result<(), ExecutorError> {
        if self.is_terminal() {
            return Err(ExecutorError::invalid_transition(&self.id, self.status, status));
        }
        if !status.is_terminal() {
            return Err(ExecutorError::invalid_transition(&self.id, self.status, status));
        }

        let end = self.next_timestamp();
        self.end_time = Some(end);
        self.metrics.execution_time_ms =
            u64::try_from((end - self.start_time).num_milliseconds()).unwrap_or(0);
        self.status = status;
        self.error = error;
        Ok(())
    }
}

/// What `execute_job` hands back to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobRunResult {
    pub success: bool,
    pub job_run_id: String,
    pub job_id: String,
    pub status: RunStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metrics: RunMetrics,
}

impl From<&JobRun> for JobRunResult {
    fn from(run: &JobRun) -> Self {
        let message = match run.status {
            RunStatus::Success => format!(
                "Job '{}' completed: {} records processed in {}ms",
                run.job_name, run.metrics.records_processed, run.metrics.execution_time_ms
            ),
            RunStatus::Running => format!("Job '{}' is running", run.job_name),
            status => format!(
                "Job '{}' finished with status {status}: {}",
                run.job_name,
                run.error.as_deref().unwrap_or("unknown error")
            ),
        };
        Self {
            success: run.status == RunStatus::Success,
            job_run_id: run.id.clone(),
            job_id: run.job_id.clone(),
            status: run.status,
            message,
            error: run.error.clone(),
            metrics: run.metrics.clone(),
        }
    }
}
