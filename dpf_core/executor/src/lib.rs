pub mod batch;
pub mod custom;
pub mod locks;
mod pipeline;
pub mod run;
pub mod status;
pub mod store;
pub mod transform;

pub use batch::{BatchCoordinator, BatchExecutionResult, BatchJobResult};
pub use custom::{CustomFn, CustomFunctions};
pub use locks::SourceLocks;
pub use pipeline::PipelineExecutor;
pub use run::{JobRun, JobRunResult, LogEntry, LogLevel, RunMetrics, RunStatus};
pub use status::{SystemHealth, SystemStatusAggregator, SystemStatusSnapshot};
pub use store::{MemoryRunStore, RunStore};
pub use transform::TransformError;

use catalog::CatalogError;
use common::error::diagnostics::DiagnosticMessage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("job not found: {context}")]
    JobNotFound { context: DiagnosticMessage },
    #[error("job has no sources: {context}")]
    NoSources { context: DiagnosticMessage },
    #[error("job run not found: {context}")]
    RunNotFound { context: DiagnosticMessage },
    #[error("invalid run transition: {context}")]
    InvalidTransition { context: DiagnosticMessage },
    #[error("catalog error: {context}")]
    Catalog {
        context: DiagnosticMessage,
        #[source]
        source: CatalogError,
    },
    #[error("run store error: {context}")]
    Store {
        context: DiagnosticMessage,
        #[source]
        source: std::io::Error,
    },
}

impl ExecutorError {
    #[track_caller]
    pub fn job_not_found(job_id: &str) -> Self {
        Self::JobNotFound {
            context: DiagnosticMessage::new(format!("job '{job_id}' not found")),
        }
    }

    #[track_caller]
    pub fn no_sources(job_id: &str) -> Self {
        Self::NoSources {
            context: DiagnosticMessage::new(format!("job '{job_id}' has no sources configured")),
        }
    }

    #[track_caller]
    pub fn run_not_found(run_id: &str) -> Self {
        Self::RunNotFound {
            context: DiagnosticMessage::new(format!("job run '{run_id}' not found")),
        }
    }

    #[track_caller]
    pub fn invalid_transition(run_id: &str, from: RunStatus, to: RunStatus) -> Self {
        Self::InvalidTransition {
            context: DiagnosticMessage::new(format!(
                "job run '{run_id}' cannot move from {from} to {to}"
            )),
        }
    }

    /// Raised before any run exists.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            ExecutorError::JobNotFound { .. } | ExecutorError::NoSources { .. }
        )
    }

    pub fn message(&self) -> &str {
        match self {
            ExecutorError::JobNotFound { context }
            | ExecutorError::NoSources { context }
            | ExecutorError::RunNotFound { context }
            | ExecutorError::InvalidTransition { context }
            | ExecutorError::Catalog { context, .. }
            | ExecutorError::Store { context, .. } => context.message(),
        }
    }
}

impl From<CatalogError> for ExecutorError {
    #[track_caller]
    fn from(err: CatalogError) -> Self {
        ExecutorError::Catalog {
            context: DiagnosticMessage::new(err.to_string()),
            source: err,
        }
    }
}

impl From<std::io::Error> for ExecutorError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        ExecutorError::Store {
            context: DiagnosticMessage::new(err.to_string()),
            source: err,
        }
    }
}
