use crate::{apply_limit, AdapterError, ConnectionInfo, SourceAdapter};
use async_trait::async_trait;
use catalog::{DataSource, DataSourceConfig};
use common::types::Record;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// In-process data source.
///
/// Extraction yields the records declared inline on the source followed by
/// anything previously loaded into a source with the same id, so one job's
/// destination can feed another job. Clones share the same sink.
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    sink: Arc<RwLock<HashMap<String, Vec<Record>>>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything loaded into `destination_id` so far.
    pub fn loaded(&self, destination_id: &str) -> Vec<Record> {
        self.sink
            .read()
            .get(destination_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        self.sink.write().clear();
    }

    fn inline_records<'a>(source: &'a DataSource) -> Result<&'a [Record], AdapterError> {
        match &source.config {
            DataSourceConfig::Memory { records } => Ok(records),
            other => Err(AdapterError::unsupported(format!(
                "memory adapter cannot serve {} source '{}'",
                other.kind(),
                source.id
            ))),
        }
    }
}

#[async_trait]
impl SourceAdapter for MemoryAdapter {
    async fn probe(&self, source: &DataSource) -> Result<ConnectionInfo, AdapterError> {
        let inline = Self::inline_records(source)?.len();
        let loaded = self.sink.read().get(&source.id).map_or(0, Vec::len);
        Ok(ConnectionInfo::for_source(source)
            .with_detail(format!("{inline} inline records, {loaded} loaded records")))
    }

    async fn extract(&self, source: &DataSource) -> Result<Vec<Record>, AdapterError> {
        let mut records = Self::inline_records(source)?.to_vec();
        if let Some(loaded) = self.sink.read().get(&source.id) {
            records.extend(loaded.iter().cloned());
        }
        Ok(apply_limit(source, records))
    }

    async fn load(&self, destination: &DataSource, records: &[Record]) -> Result<usize, AdapterError> {
        Self::inline_records(destination)?;
        self.sink
            .write()
            .entry(destination.id.clone())
            .or_default()
            .extend(records.iter().cloned());
        Ok(records.len())
    }
}
