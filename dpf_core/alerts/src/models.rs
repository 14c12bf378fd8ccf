use chrono::{DateTime, Utc};
use common::types::EntityRef;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Success,
    Warning,
    Error,
    Destructive,
}
impl Display for AlertSeverity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Info => write!(f, "info"),
            AlertSeverity::Success => write!(f, "success"),
            AlertSeverity::Warning => write!(f, "warning"),
            AlertSeverity::Error => write!(f, "error"),
            AlertSeverity::Destructive => write!(f, "destructive"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub source: String,
    pub category: String,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related: Option<EntityRef>,
}

/// What a component hands to [`crate::AlertService::emit`].
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub severity: AlertSeverity,
    pub message: String,
    pub source: String,
    pub category: String,
    pub details: Option<Json>,
    pub related: Option<EntityRef>,
}

impl NewAlert {
    pub fn new(
        severity: AlertSeverity,
        source: impl Into<String>,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            message: message.into(),
            source: source.into(),
            category: category.into(),
            details: None,
            related: None,
        }
    }

    pub fn with_details(mut self, details: Json) -> Self {
        self.details = Some(details);
        self
    }

    pub fn related_to(mut self, entity: EntityRef) -> Self {
        self.related = Some(entity);
        self
    }

    pub(crate) fn into_alert(self) -> Alert {
        Alert {
            id: Uuid::new_v4().to_string(),
            severity: self.severity,
            message: self.message,
            source: self.source,
            category: self.category,
            timestamp: Utc::now(),
            acknowledged: false,
            details: self.details,
            related: self.related,
        }
    }
}
