use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

/// One row flowing through a pipeline.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Job,
    JobRun,
    DataSource,
    Transformation,
    Batch,
}
impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Job => write!(f, "job"),
            EntityKind::JobRun => write!(f, "job run"),
            EntityKind::DataSource => write!(f, "data source"),
            EntityKind::Transformation => write!(f, "transformation"),
            EntityKind::Batch => write!(f, "batch"),
        }
    }
}

/// Pointer from an alert (or log line) to the entity it concerns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}
impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}
