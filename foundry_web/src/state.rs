use alerts::AlertService;
use catalog::{load_specs, MemoryCatalog, SpecSummary};
use common::config::OrchestratorConfig;
use common::error::FFError;
use executor::{
    BatchCoordinator, MemoryRunStore, PipelineExecutor, RunStore, SystemStatusAggregator,
};
use shared_clients::{AdapterRegistry, ConnectionTester};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const CATALOG_FILE: &str = "catalog.json";
pub const RUNS_FILE: &str = "runs.json";
pub const ALERTS_FILE: &str = "alerts.json";

/// Every component the REST handlers and the CLI commands talk to, sharing
/// one catalog, run store and alert feed.
#[derive(Clone)]
pub struct AppState {
    pub catalog: MemoryCatalog,
    pub alerts: AlertService,
    pub executor: PipelineExecutor,
    pub batch: BatchCoordinator,
    pub status: SystemStatusAggregator,
    pub tester: ConnectionTester,
}

impl AppState {
    /// Build from config. With `state_dir` set, catalog, runs and alerts
    /// are restored from and written through to JSON files there; with
    /// `specs_dir` set, the pipeline specs found there are registered.
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self, FFError> {
        let state = match &config.state_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(FFError::init)?;
                let alerts = AlertService::open(dir.join(ALERTS_FILE), config.alerts.max_alerts)
                    .map_err(FFError::init)?;
                let catalog = MemoryCatalog::open(dir.join(CATALOG_FILE), alerts.clone())
                    .map_err(FFError::init)?;
                let runs = MemoryRunStore::open(dir.join(RUNS_FILE)).map_err(FFError::init)?;
                log::info!("using state directory {}", dir.display());
                Self::assemble(config, alerts, catalog, runs, AdapterRegistry::with_defaults())
            }
            None => Self::in_memory(config, AdapterRegistry::with_defaults()),
        };

        if let Some(dir) = &config.specs_dir {
            state.register_specs(dir)?;
        }
        Ok(state)
    }

    /// Nothing persisted; used by tests and embedders.
    pub fn in_memory(config: &OrchestratorConfig, adapters: AdapterRegistry) -> Self {
        let alerts = AlertService::with_max_alerts(config.alerts.max_alerts);
        let catalog = MemoryCatalog::new(alerts.clone());
        Self::assemble(config, alerts, catalog, MemoryRunStore::new(), adapters)
    }

    fn assemble(
        config: &OrchestratorConfig,
        alerts: AlertService,
        catalog: MemoryCatalog,
        runs: MemoryRunStore,
        adapters: AdapterRegistry,
    ) -> Self {
        let runs: Arc<dyn RunStore> = Arc::new(runs.with_max_runs(config.executor.max_runs));
        let executor = PipelineExecutor::new(
            Arc::new(catalog.clone()),
            alerts.clone(),
            adapters.clone(),
            runs,
        );
        let batch = BatchCoordinator::new(executor.clone())
            .with_concurrency(config.executor.max_concurrent_jobs);
        let status =
            SystemStatusAggregator::for_executor(&executor).with_recent_runs(config.status.recent_runs);
        let tester = ConnectionTester::new(adapters)
            .with_sample_rows(config.executor.extraction_sample_rows)
            .with_probe_timeout(Duration::from_millis(config.executor.probe_timeout_ms));

        Self {
            catalog,
            alerts,
            executor,
            batch,
            status,
            tester,
        }
    }

    pub fn register_specs(&self, dir: &Path) -> Result<SpecSummary, FFError> {
        let spec = load_specs(dir).map_err(FFError::init)?;
        let summary = self.catalog.register_spec(spec).map_err(FFError::init)?;
        log::info!(
            "registered {} catalog entries from {} ({} already present)",
            summary.registered,
            dir.display(),
            summary.skipped
        );
        Ok(summary)
    }
}
