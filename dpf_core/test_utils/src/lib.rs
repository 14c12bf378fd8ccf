//! Fixtures shared by the integration tests: an in-memory harness wiring
//! catalog, alerts, run store and executor together, plus adapters that
//! misbehave on purpose.

use alerts::AlertService;
use async_trait::async_trait;
use catalog::{
    DataSource, DataSourceConfig, DataSourceType, Job, MemoryCatalog, NewDataSource, NewJob,
    NewTransformation, Register, Transformation,
};
use common::types::Record;
use executor::{
    BatchCoordinator, MemoryRunStore, PipelineExecutor, RunStore, SystemStatusAggregator,
};
use serde_json::json;
use shared_clients::{
    AdapterError, AdapterRegistry, ConnectionInfo, ConnectionTester, FileAdapter, MemoryAdapter,
    SourceAdapter,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// `n` records shaped `{ id, name, amount }`.
pub fn records(n: usize, prefix: &str) -> Vec<Record> {
    (0..n)
        .map(|i| {
            let value = json!({
                "id": format!("{prefix}-{i}"),
                "name": format!("{prefix} {i}"),
                "amount": (i as i64 + 1) * 10,
            });
            match value {
                serde_json::Value::Object(map) => map,
                _ => Record::new(),
            }
        })
        .collect()
}

/// Fails the first `failures` extract/load calls, then serves `records`
/// (extract) or accepts writes (load). Probes are counted apart and fail
/// only for the first `probe_failures` calls.
pub struct FlakyAdapter {
    failures: u32,
    calls: AtomicU32,
    probe_failures: u32,
    probes: AtomicU32,
    records: Vec<Record>,
}

impl FlakyAdapter {
    pub fn new(failures: u32, records: Vec<Record>) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
            probe_failures: 0,
            probes: AtomicU32::new(0),
            records,
        }
    }

    /// Reachable, but every extract and load fails.
    pub fn broken() -> Self {
        Self::new(u32::MAX, Vec::new())
    }

    /// Every probe fails; extract would still serve `records`.
    pub fn unreachable(records: Vec<Record>) -> Self {
        Self {
            probe_failures: u32::MAX,
            ..Self::new(0, records)
        }
    }

    fn attempt(counter: &AtomicU32, failures: u32, what: &str) -> Result<(), AdapterError> {
        let call = counter.fetch_add(1, Ordering::SeqCst);
        if call < failures {
            Err(AdapterError::connection(format!("{what} refused (attempt {})", call + 1)))
        } else {
            Ok(())
        }
    }

    /// Extract and load calls so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> u32 {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for FlakyAdapter {
    async fn probe(&self, source: &DataSource) -> Result<ConnectionInfo, AdapterError> {
        Self::attempt(&self.probes, self.probe_failures, "probe")?;
        Ok(ConnectionInfo::for_source(source))
    }

    async fn extract(&self, _source: &DataSource) -> Result<Vec<Record>, AdapterError> {
        Self::attempt(&self.calls, self.failures, "extract")?;
        Ok(self.records.clone())
    }

    async fn load(&self, _destination: &DataSource, records: &[Record]) -> Result<usize, AdapterError> {
        Self::attempt(&self.calls, self.failures, "load")?;
        Ok(records.len())
    }
}

/// Sleeps `delay` before every operation.
pub struct SlowAdapter {
    pub delay: Duration,
}

#[async_trait]
impl SourceAdapter for SlowAdapter {
    async fn probe(&self, source: &DataSource) -> Result<ConnectionInfo, AdapterError> {
        tokio::time::sleep(self.delay).await;
        Ok(ConnectionInfo::for_source(source))
    }

    async fn extract(&self, _source: &DataSource) -> Result<Vec<Record>, AdapterError> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    async fn load(&self, _destination: &DataSource, records: &[Record]) -> Result<usize, AdapterError> {
        tokio::time::sleep(self.delay).await;
        Ok(records.len())
    }
}

/// Catalog, alerts, run store and executor sharing state, with memory and
/// file adapters installed. The memory sink is exposed for assertions.
pub struct Harness {
    pub alerts: AlertService,
    pub catalog: MemoryCatalog,
    pub sink: MemoryAdapter,
    pub runs: MemoryRunStore,
    pub adapters: AdapterRegistry,
    pub executor: PipelineExecutor,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_adapters(HashMap::new())
    }

    /// Extra adapters for the given types, on top of memory and file.
    pub fn with_adapters(extra: HashMap<DataSourceType, Arc<dyn SourceAdapter>>) -> Self {
        let alerts = AlertService::new();
        let catalog = MemoryCatalog::new(alerts.clone());
        let sink = MemoryAdapter::new();
        let runs = MemoryRunStore::new();

        let mut adapters = AdapterRegistry::new()
            .with(DataSourceType::Memory, sink.clone())
            .with(DataSourceType::File, FileAdapter);
        for (kind, adapter) in extra {
            adapters.register(kind, adapter);
        }

        let store: Arc<dyn RunStore> = Arc::new(runs.clone());
        let executor = PipelineExecutor::new(
            Arc::new(catalog.clone()),
            alerts.clone(),
            adapters.clone(),
            store,
        );

        Self {
            alerts,
            catalog,
            sink,
            runs,
            adapters,
            executor,
        }
    }

    pub fn memory_source(&self, id: &str, records: Vec<Record>) -> DataSource {
        self.catalog
            .create_data_source(
                NewDataSource::new(format!("{id} source"), DataSourceConfig::Memory { records })
                    .with_id(id),
            )
            .expect("create memory source")
    }

    /// Empty memory data source to load into.
    pub fn destination(&self, id: &str) -> DataSource {
        self.memory_source(id, Vec::new())
    }

    /// Data source of an arbitrary config; pair with [`Harness::with_adapters`]
    /// to route it to a custom adapter.
    pub fn source_with(&self, id: &str, config: DataSourceConfig) -> DataSource {
        self.catalog
            .create_data_source(NewDataSource::new(format!("{id} source"), config).with_id(id))
            .expect("create source")
    }

    pub fn transformation(&self, new: NewTransformation) -> Transformation {
        self.catalog
            .create_transformation(new)
            .expect("create transformation")
    }

    pub fn job(&self, new: NewJob) -> Job {
        self.catalog.create_job(new).expect("create job")
    }

    pub fn batch(&self) -> BatchCoordinator {
        BatchCoordinator::new(self.executor.clone())
    }

    pub fn status(&self) -> SystemStatusAggregator {
        SystemStatusAggregator::for_executor(&self.executor)
    }

    pub fn tester(&self) -> ConnectionTester {
        ConnectionTester::new(self.adapters.clone())
    }
}

/// Config routed to an API adapter in tests.
pub fn api_config(url: &str) -> DataSourceConfig {
    DataSourceConfig::Api {
        url: url.to_string(),
        method: "GET".to_string(),
        headers: HashMap::new(),
    }
}
