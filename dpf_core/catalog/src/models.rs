use chrono::{DateTime, Utc};
use common::types::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub(crate) fn new_id(explicit: Option<String>) -> String {
    explicit
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/* ---------------- data sources ---------------- */

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceType {
    Database,
    File,
    Api,
    Ftp,
    Memory,
}
impl Display for DataSourceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSourceType::Database => write!(f, "database"),
            DataSourceType::File => write!(f, "file"),
            DataSourceType::Api => write!(f, "api"),
            DataSourceType::Ftp => write!(f, "ftp"),
            DataSourceType::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum FileFormat {
    /// a single JSON array of objects
    #[default]
    Json,
    /// one JSON object per line
    JsonLines,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DataSourceConfig {
    #[serde(rename_all = "camelCase")]
    Database {
        engine: String,
        host: String,
        port: u16,
        database: String,
        user: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        table: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    File {
        path: String,
        #[serde(default)]
        format: FileFormat,
    },
    #[serde(rename_all = "camelCase")]
    Api {
        url: String,
        #[serde(default = "default_http_method")]
        method: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    #[serde(rename_all = "camelCase")]
    Ftp {
        host: String,
        #[serde(default = "default_ftp_port")]
        port: u16,
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Memory {
        #[serde(default)]
        records: Vec<Record>,
    },
}

fn default_http_method() -> String {
    "GET".to_string()
}

fn default_ftp_port() -> u16 {
    21
}

impl DataSourceConfig {
    pub fn kind(&self) -> DataSourceType {
        match self {
            DataSourceConfig::Database { .. } => DataSourceType::Database,
            DataSourceConfig::File { .. } => DataSourceType::File,
            DataSourceConfig::Api { .. } => DataSourceType::Api,
            DataSourceConfig::Ftp { .. } => DataSourceType::Ftp,
            DataSourceConfig::Memory { .. } => DataSourceType::Memory,
        }
    }

    /// Connection target without credentials, for logs and test results.
    pub fn endpoint(&self) -> String {
        match self {
            DataSourceConfig::Database {
                engine,
                host,
                port,
                database,
                ..
            } => format!("{engine}://{host}:{port}/{database}"),
            DataSourceConfig::File { path, .. } => format!("file://{path}"),
            DataSourceConfig::Api { method, url, .. } => format!("{method} {url}"),
            DataSourceConfig::Ftp {
                host, port, path, ..
            } => format!("ftp://{host}:{port}{path}"),
            DataSourceConfig::Memory { records } => format!("memory ({} records)", records.len()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionConfig {
    /// Maximum rows pulled per extraction; `None` means everything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub id: String,
    pub name: String,
    pub config: DataSourceConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction: Option<ExtractionConfig>,
    pub status: DataSourceStatus,
    pub last_sync_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
impl DataSource {
    pub fn kind(&self) -> DataSourceType {
        self.config.kind()
    }

    pub fn is_active(&self) -> bool {
        self.status == DataSourceStatus::Active
    }

    /// Copy of this source whose extraction limit is `limit`.
    pub fn with_extraction_limit(&self, limit: usize) -> DataSource {
        let mut copy = self.clone();
        let mut extraction = copy.extraction.take().unwrap_or_default();
        extraction.limit = Some(limit);
        copy.extraction = Some(extraction);
        copy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDataSource {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub config: DataSourceConfig,
    #[serde(default)]
    pub extraction: Option<ExtractionConfig>,
    #[serde(default)]
    pub status: DataSourceStatus,
}
impl NewDataSource {
    pub fn new(name: impl Into<String>, config: DataSourceConfig) -> Self {
        Self {
            id: None,
            name: name.into(),
            config,
            extraction: None,
            status: DataSourceStatus::Active,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub(crate) fn into_data_source(self) -> DataSource {
        let now = Utc::now();
        DataSource {
            id: new_id(self.id),
            name: self.name,
            config: self.config,
            extraction: self.extraction,
            status: self.status,
            last_sync_date: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/* ---------------- transformations ---------------- */

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransformationType {
    Filter,
    Map,
    Aggregate,
    Join,
    Custom,
}
impl Display for TransformationType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformationType::Filter => write!(f, "filter"),
            TransformationType::Map => write!(f, "map"),
            TransformationType::Aggregate => write!(f, "aggregate"),
            TransformationType::Join => write!(f, "join"),
            TransformationType::Custom => write!(f, "custom"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    /// regular expression match on the string form of the field
    Matches,
    Exists,
    NotExists,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Predicate {
    pub field: String,
    pub op: FilterOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Json>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum MapOperation {
    Set { field: String, value: Json },
    Copy { from: String, to: String },
    Rename { from: String, to: String },
    Remove { field: String },
    Uppercase { field: String },
    Lowercase { field: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    pub function: AggregateFunction,
    /// Not needed for `count`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub alias: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum JoinReference {
    Inline { records: Vec<Record> },
    DataSource { id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TransformationConfig {
    Filter {
        predicate: Predicate,
    },
    Map {
        operations: Vec<MapOperation>,
    },
    #[serde(rename_all = "camelCase")]
    Aggregate {
        #[serde(default)]
        group_by: Vec<String>,
        aggregations: Vec<Aggregation>,
    },
    #[serde(rename_all = "camelCase")]
    Join {
        reference: JoinReference,
        left_key: String,
        right_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
    },
    Custom {
        function: String,
        #[serde(default)]
        args: Json,
    },
}
impl TransformationConfig {
    pub fn kind(&self) -> TransformationType {
        match self {
            TransformationConfig::Filter { .. } => TransformationType::Filter,
            TransformationConfig::Map { .. } => TransformationType::Map,
            TransformationConfig::Aggregate { .. } => TransformationType::Aggregate,
            TransformationConfig::Join { .. } => TransformationType::Join,
            TransformationConfig::Custom { .. } => TransformationType::Custom,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transformation {
    pub id: String,
    pub name: String,
    pub order: i32,
    pub enabled: bool,
    pub config: TransformationConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
impl Transformation {
    pub fn kind(&self) -> TransformationType {
        self.config.kind()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransformation {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub order: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub config: TransformationConfig,
}
impl NewTransformation {
    pub fn new(name: impl Into<String>, order: i32, config: TransformationConfig) -> Self {
        Self {
            id: None,
            name: name.into(),
            order,
            enabled: true,
            config,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub(crate) fn into_transformation(self) -> Transformation {
        let now = Utc::now();
        Transformation {
            id: new_id(self.id),
            name: self.name,
            order: self.order,
            enabled: self.enabled,
            config: self.config,
            created_at: now,
            updated_at: now,
        }
    }
}

fn default_true() -> bool {
    true
}

/* ---------------- jobs ---------------- */

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "frequency", rename_all = "camelCase")]
pub enum Schedule {
    #[default]
    Manual,
    #[serde(rename_all = "camelCase")]
    Interval { every_secs: u64 },
    Cron { expression: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct JobSettings {
    /// Records written per destination call.
    pub batch_size: usize,
    /// Deadline for extract + transform + load; the run is aborted past it.
    pub timeout_ms: u64,
    /// Extra attempts for a failing extraction or destination write.
    pub max_retries: u32,
    pub alert_on_success: bool,
    pub alert_on_failure: bool,
    /// Drop empty records before load and count them as skipped.
    pub validate_data: bool,
    /// Fail the run on the first failing source, transformation or
    /// destination; otherwise the failing unit is logged and skipped.
    pub stop_on_error: bool,
}
impl Default for JobSettings {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            timeout_ms: 300_000,
            max_retries: 0,
            alert_on_success: false,
            alert_on_failure: true,
            validate_data: false,
            stop_on_error: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub name: String,
    pub sources: Vec<String>,
    pub transformations: Vec<String>,
    pub destinations: Vec<String>,
    pub schedule: Schedule,
    pub settings: JobSettings,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
impl Job {
    /// Every data source id the job touches, sorted and de-duplicated.
    pub fn touched_sources(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sources
            .iter()
            .chain(self.destinations.iter())
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Create payload for a job.
///
/// Accepts the single `source` / `destination` fields as well as the
/// `sources` / `destinations` lists; both collapse into one ordered list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub transformations: Vec<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub destinations: Vec<String>,
    #[serde(default)]
    pub schedule: Schedule,
    #[serde(default)]
    pub settings: JobSettings,
    #[serde(default = "default_true")]
    pub enabled: bool,
}
impl NewJob {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn source(mut self, id: impl Into<String>) -> Self {
        self.sources.push(id.into());
        self
    }

    pub fn transformation(mut self, id: impl Into<String>) -> Self {
        self.transformations.push(id.into());
        self
    }

    pub fn destination(mut self, id: impl Into<String>) -> Self {
        self.destinations.push(id.into());
        self
    }

    pub fn settings(mut self, settings: JobSettings) -> Self {
        self.settings = settings;
        self
    }

    pub(crate) fn into_job(self) -> Job {
        let now = Utc::now();
        Job {
            id: new_id(self.id),
            name: self.name,
            sources: merge_refs(self.source, self.sources),
            transformations: self.transformations,
            destinations: merge_refs(self.destination, self.destinations),
            schedule: self.schedule,
            settings: self.settings,
            enabled: self.enabled,
            created_at: now,
            updated_at: now,
        }
    }
}

fn merge_refs(single: Option<String>, list: Vec<String>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(list.len() + 1);
    for id in single.into_iter().chain(list) {
        if !merged.contains(&id) {
            merged.push(id);
        }
    }
    merged
}

/* ---------------- counts ---------------- */

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntityCount {
    pub total: usize,
    /// enabled jobs / transformations, active data sources
    pub enabled: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogCounts {
    pub jobs: EntityCount,
    pub data_sources: EntityCount,
    pub transformations: EntityCount,
}
