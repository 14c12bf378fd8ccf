use common::error::diagnostics::DiagnosticMessage;
use common::error::ConfigError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog entry already exists: {context}")]
    Duplicate { context: DiagnosticMessage },
    #[error("catalog lookup failed: {context}")]
    NotFound { context: DiagnosticMessage },
    #[error("serde json error: {context}")]
    SerdeJson {
        context: DiagnosticMessage,
        #[source]
        source: serde_json::Error,
    },
    #[error("serde yaml error: {context}")]
    SerdeYaml {
        context: DiagnosticMessage,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("I/O error: {context}")]
    Io {
        context: DiagnosticMessage,
        #[source]
        source: io::Error,
    },
    #[error("invalid pipeline spec: {context}")]
    InvalidSpec { context: DiagnosticMessage },
}

impl CatalogError {
    #[track_caller]
    pub fn duplicate(kind: impl std::fmt::Display, id: impl Into<String>) -> Self {
        let id = id.into();
        Self::Duplicate {
            context: DiagnosticMessage::new(format!("{kind} '{id}' already exists")),
        }
    }

    #[track_caller]
    pub fn not_found(kind: impl std::fmt::Display, id: impl Into<String>) -> Self {
        let id = id.into();
        Self::NotFound {
            context: DiagnosticMessage::new(format!("{kind} '{id}' not found")),
        }
    }

    #[track_caller]
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidSpec {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            CatalogError::Duplicate { context }
            | CatalogError::NotFound { context }
            | CatalogError::InvalidSpec { context }
            | CatalogError::SerdeJson { context, .. }
            | CatalogError::SerdeYaml { context, .. }
            | CatalogError::Io { context, .. } => context.message(),
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        CatalogError::SerdeJson {
            context: DiagnosticMessage::new(err.to_string()),
            source: err,
        }
    }
}

impl From<serde_yaml::Error> for CatalogError {
    #[track_caller]
    fn from(err: serde_yaml::Error) -> Self {
        CatalogError::SerdeYaml {
            context: DiagnosticMessage::new(err.to_string()),
            source: err,
        }
    }
}

impl From<io::Error> for CatalogError {
    #[track_caller]
    fn from(err: io::Error) -> Self {
        CatalogError::Io {
            context: DiagnosticMessage::new(err.to_string()),
            source: err,
        }
    }
}

impl From<ConfigError> for CatalogError {
    #[track_caller]
    fn from(err: ConfigError) -> Self {
        CatalogError::InvalidSpec {
            context: DiagnosticMessage::new(err.to_string()),
        }
    }
}
