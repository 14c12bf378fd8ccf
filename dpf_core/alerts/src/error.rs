use common::error::diagnostics::DiagnosticMessage;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert lookup failed: {context}")]
    NotFound { context: DiagnosticMessage },
    #[error("I/O error: {context}")]
    Io {
        context: DiagnosticMessage,
        #[source]
        source: io::Error,
    },
}

impl AlertError {
    #[track_caller]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            context: DiagnosticMessage::new(format!("alert '{}' not found", id.into())),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AlertError::NotFound { context } | AlertError::Io { context, .. } => context.message(),
        }
    }
}

impl From<io::Error> for AlertError {
    #[track_caller]
    fn from(err: io::Error) -> Self {
        AlertError::Io {
            context: DiagnosticMessage::new(err.to_string()),
            source: err,
        }
    }
}
