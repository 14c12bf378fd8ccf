use crate::{AdapterError, AdapterRegistry, ConnectionInfo};
use catalog::DataSource;
use chrono::{DateTime, Utc};
use common::types::Record;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};

pub const DEFAULT_SAMPLE_ROWS: usize = 5;
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestDetails {
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_info: Option<ConnectionInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<Vec<Record>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestResult {
    pub success: bool,
    pub message: String,
    pub details: ConnectionTestDetails,
    pub timestamp: DateTime<Utc>,
}

impl ConnectionTestResult {
    fn failed(source: &DataSource, err: &AdapterError, started: Instant) -> Self {
        log::warn!("connection test for '{}' failed: {err}", source.id);
        Self {
            success: false,
            message: format!("Connection to '{}' failed: {}", source.name, err.message()),
            details: ConnectionTestDetails {
                latency_ms: elapsed_ms(started),
                error: Some(err.message().to_string()),
                ..Default::default()
            },
            timestamp: Utc::now(),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Probes data sources through their adapters. Failures are reported in the
/// returned result, never as an `Err`.
#[derive(Debug, Clone)]
pub struct ConnectionTester {
    adapters: AdapterRegistry,
    sample_rows: usize,
    probe_timeout: Duration,
}

impl ConnectionTester {
    pub fn new(adapters: AdapterRegistry) -> Self {
        Self {
            adapters,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_sample_rows(mut self, rows: usize) -> Self {
        self.sample_rows = rows.max(1);
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T, AdapterError>
    where
        F: Future<Output = Result<T, AdapterError>>,
    {
        match tokio::time::timeout(self.probe_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::timeout(what, self.probe_timeout)),
        }
    }

    pub async fn test_connection(&self, source: &DataSource) -> ConnectionTestResult {
        let started = Instant::now();
        let probed = match self.adapters.resolve(source.kind()) {
            Ok(adapter) => self.bounded("connection probe", adapter.probe(source)).await,
            Err(err) => Err(err),
        };

        match probed {
            Ok(info) => {
                log::info!("connection to '{}' ok ({})", source.id, info.endpoint);
                ConnectionTestResult {
                    success: true,
                    message: format!("Connected to '{}'", source.name),
                    details: ConnectionTestDetails {
                        latency_ms: elapsed_ms(started),
                        connection_info: Some(info),
                        ..Default::default()
                    },
                    timestamp: Utc::now(),
                }
            }
            Err(err) => ConnectionTestResult::failed(source, &err, started),
        }
    }

    /// Tests each source in turn; results are keyed by source id.
    pub async fn batch_test_connections(
        &self,
        sources: &[DataSource],
    ) -> BTreeMap<String, ConnectionTestResult> {
        let mut results = BTreeMap::new();
        for source in sources {
            let result = self.test_connection(source).await;
            results.insert(source.id.clone(), result);
        }
        results
    }

    /// Connection test followed by a small sample extraction. The source
    /// itself is not modified; the row limit goes on a copy.
    pub async fn test_extraction(&self, source: &DataSource) -> ConnectionTestResult {
        let started = Instant::now();
        let connected = self.test_connection(source).await;
        if !connected.success {
            return connected;
        }

        let sampled = source.with_extraction_limit(self.sample_rows);
        let extracted = match self.adapters.resolve(sampled.kind()) {
            Ok(adapter) => self.bounded("sample extraction", adapter.extract(&sampled)).await,
            Err(err) => Err(err),
        };

        match extracted {
            Ok(mut records) => {
                records.truncate(self.sample_rows);
                ConnectionTestResult {
                    success: true,
                    message: format!(
                        "Extracted {} sample records from '{}'",
                        records.len(),
                        source.name
                    ),
                    details: ConnectionTestDetails {
                        latency_ms: elapsed_ms(started),
                        connection_info: connected.details.connection_info,
                        record_count: Some(records.len()),
                        sample: Some(records),
                        error: None,
                    },
                    timestamp: Utc::now(),
                }
            }
            Err(err) => ConnectionTestResult::failed(source, &err, started),
        }
    }
}
