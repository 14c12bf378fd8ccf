pub mod connection;
pub mod file;
pub mod memory;

pub use connection::{ConnectionTestDetails, ConnectionTestResult, ConnectionTester};
pub use file::FileAdapter;
pub use memory::MemoryAdapter;

use async_trait::async_trait;
use catalog::{DataSource, DataSourceType};
use common::error::diagnostics::DiagnosticMessage;
use common::types::Record;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("unsupported data source: {context}")]
    Unsupported { context: DiagnosticMessage },
    #[error("connection failed: {context}")]
    Connection { context: DiagnosticMessage },
    #[error("extraction failed: {context}")]
    Extraction { context: DiagnosticMessage },
    #[error("load failed: {context}")]
    Load { context: DiagnosticMessage },
    #[error("timed out: {context}")]
    Timeout { context: DiagnosticMessage },
    #[error("I/O error: {context}")]
    Io {
        context: DiagnosticMessage,
        #[source]
        source: std::io::Error,
    },
}

impl AdapterError {
    #[track_caller]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn load(message: impl Into<String>) -> Self {
        Self::Load {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn timeout(what: impl std::fmt::Display, after: Duration) -> Self {
        Self::Timeout {
            context: DiagnosticMessage::new(format!(
                "{what} did not finish within {}ms",
                after.as_millis()
            )),
        }
    }

    /// Message without call-site, as it should appear in run logs.
    pub fn message(&self) -> &str {
        match self {
            AdapterError::Unsupported { context }
            | AdapterError::Connection { context }
            | AdapterError::Extraction { context }
            | AdapterError::Load { context }
            | AdapterError::Timeout { context }
            | AdapterError::Io { context, .. } => context.message(),
        }
    }
}

impl From<std::io::Error> for AdapterError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        let message = err.to_string();
        AdapterError::Io {
            context: DiagnosticMessage::new(message),
            source: err,
        }
    }
}

/// What a successful probe learned about the other side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub source_type: DataSourceType,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ConnectionInfo {
    pub fn for_source(source: &DataSource) -> Self {
        Self {
            source_type: source.kind(),
            endpoint: source.config.endpoint(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Talks to one kind of data source.
///
/// `extract` honours `source.extraction.limit` when present; `load` returns
/// how many records were written.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn probe(&self, source: &DataSource) -> Result<ConnectionInfo, AdapterError>;
    async fn extract(&self, source: &DataSource) -> Result<Vec<Record>, AdapterError>;
    async fn load(&self, destination: &DataSource, records: &[Record]) -> Result<usize, AdapterError>;
}

#[async_trait]
impl<T> SourceAdapter for Arc<T>
where
    T: SourceAdapter + ?Sized,
{
    async fn probe(&self, source: &DataSource) -> Result<ConnectionInfo, AdapterError> {
        (**self).probe(source).await
    }

    async fn extract(&self, source: &DataSource) -> Result<Vec<Record>, AdapterError> {
        (**self).extract(source).await
    }

    async fn load(&self, destination: &DataSource, records: &[Record]) -> Result<usize, AdapterError> {
        (**self).load(destination, records).await
    }
}

pub type SharedAdapter = Arc<dyn SourceAdapter>;

pub(crate) fn apply_limit(source: &DataSource, mut records: Vec<Record>) -> Vec<Record> {
    if let Some(limit) = source.extraction.as_ref().and_then(|e| e.limit) {
        records.truncate(limit);
    }
    records
}

/// Adapter lookup by data source type.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<DataSourceType, SharedAdapter>,
}

impl Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.adapters.keys().collect();
        kinds.sort();
        f.debug_struct("AdapterRegistry").field("kinds", &kinds).finish()
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Memory and file adapters; the memory sink is fresh.
    pub fn with_defaults() -> Self {
        Self::new()
            .with(DataSourceType::Memory, MemoryAdapter::new())
            .with(DataSourceType::File, FileAdapter)
    }

    pub fn with(mut self, kind: DataSourceType, adapter: impl SourceAdapter + 'static) -> Self {
        self.register(kind, adapter);
        self
    }

    /// Replaces any adapter already registered for `kind`.
    pub fn register(&mut self, kind: DataSourceType, adapter: impl SourceAdapter + 'static) {
        if self.adapters.insert(kind, Arc::new(adapter)).is_some() {
            log::debug!("replaced {kind} adapter");
        }
    }

    pub fn resolve(&self, kind: DataSourceType) -> Result<SharedAdapter, AdapterError> {
        self.adapters
            .get(&kind)
            .cloned()
            .ok_or_else(|| AdapterError::unsupported(format!("no adapter registered for {kind} sources")))
    }

    pub fn kinds(&self) -> Vec<DataSourceType> {
        let mut kinds: Vec<_> = self.adapters.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matches::assert_matches;

    #[test]
    fn defaults_cover_memory_and_file() {
        let registry = AdapterRegistry::with_defaults();
        assert_eq!(
            registry.kinds(),
            vec![DataSourceType::File, DataSourceType::Memory]
        );
    }

    #[test]
    fn unknown_kind_is_unsupported() {
        let registry = AdapterRegistry::with_defaults();
        let err = registry
            .resolve(DataSourceType::Ftp)
            .err()
            .expect("ftp has no adapter");
        assert_matches!(err, AdapterError::Unsupported { .. });
        assert_eq!(err.message(), "no adapter registered for ftp sources");
    }

    #[test]
    fn timeout_message_names_the_operation() {
        let err = AdapterError::timeout("probe", Duration::from_millis(250));
        assert_eq!(err.message(), "probe did not finish within 250ms");
    }
}
