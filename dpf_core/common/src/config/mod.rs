pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use loader::{read_config, DEFAULT_CONFIG_FILE};

///  ---------------- Orchestrator Config ----------------
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub server: ServerConfig,
    pub executor: ExecutorConfig,
    pub status: StatusConfig,
    pub alerts: AlertsConfig,
    /// Directory of pipeline spec files (`*.yml`) registered at start-up.
    pub specs_dir: Option<PathBuf>,
    /// When set, catalog, runs and alerts are flushed to JSON files here.
    pub state_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8085".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Row limit used by `test_extraction` when a source sets none.
    pub extraction_sample_rows: usize,
    pub probe_timeout_ms: u64,
    /// Jobs run side by side by the batch coordinator; 1 keeps batches sequential.
    pub max_concurrent_jobs: usize,
    /// Run history kept by the run store; oldest finished runs are dropped.
    pub max_runs: usize,
}
impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            extraction_sample_rows: 5,
            probe_timeout_ms: 10_000,
            max_concurrent_jobs: 1,
            max_runs: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StatusConfig {
    pub recent_runs: usize,
}
impl Default for StatusConfig {
    fn default() -> Self {
        Self { recent_runs: 10 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AlertsConfig {
    /// Oldest alerts are dropped beyond this many.
    pub max_alerts: usize,
}
impl Default for AlertsConfig {
    fn default() -> Self {
        Self { max_alerts: 1000 }
    }
}
