pub mod error;
pub mod models;

pub use error::AlertError;
pub use models::*;

use common::utils::{read_json_or_default, write_json_atomic};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_MAX_ALERTS: usize = 1000;

/// internal flat state (easy to serde), oldest alert first
#[derive(Default, Serialize, Deserialize)]
struct State {
    alerts: Vec<Alert>,
}

/// Operator-facing notification feed shared by the registry, the executor
/// and the batch coordinator.
#[derive(Clone)]
pub struct AlertService {
    inner: Arc<RwLock<State>>,
    max_alerts: usize,
    state_file: Option<Arc<PathBuf>>,
}

impl Default for AlertService {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertService {
    pub fn new() -> Self {
        Self::with_max_alerts(DEFAULT_MAX_ALERTS)
    }

    pub fn with_max_alerts(max_alerts: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(State::default())),
            max_alerts: max_alerts.max(1),
            state_file: None,
        }
    }

    /* ---------- optional durability ---------- */

    /// Load `path` (if present) and write it back after every change.
    pub fn open(path: impl Into<PathBuf>, max_alerts: usize) -> Result<Self, AlertError> {
        let path = path.into();
        let mut service = Self::load_from(&path, max_alerts)?;
        service.state_file = Some(Arc::new(path));
        Ok(service)
    }

    pub fn load_from(path: &Path, max_alerts: usize) -> Result<Self, AlertError> {
        let state: State = read_json_or_default(path)?;
        Ok(Self {
            inner: Arc::new(RwLock::new(state)),
            max_alerts: max_alerts.max(1),
            state_file: None,
        })
    }

    pub fn flush_to(&self, path: &Path) -> Result<(), AlertError> {
        write_json_atomic(path, &*self.inner.upgradable_read())?;
        Ok(())
    }

    fn persist(&self) {
        if let Some(path) = &self.state_file {
            if let Err(e) = self.flush_to(path) {
                log::error!("failed to persist alerts to {}: {}", path.display(), e);
            }
        }
    }

    pub fn emit(&self, new: NewAlert) -> Alert {
        let alert = new.into_alert();
        match alert.severity {
            AlertSeverity::Error | AlertSeverity::Destructive => {
                log::error!("[{}] {}: {}", alert.category, alert.source, alert.message)
            }
            AlertSeverity::Warning => {
                log::warn!("[{}] {}: {}", alert.category, alert.source, alert.message)
            }
            AlertSeverity::Info | AlertSeverity::Success => {
                log::info!("[{}] {}: {}", alert.category, alert.source, alert.message)
            }
        }

        {
            let mut g = self.inner.write();
            g.alerts.push(alert.clone());
            if g.alerts.len() > self.max_alerts {
                let overflow = g.alerts.len() - self.max_alerts;
                g.alerts.drain(..overflow);
            }
        }
        self.persist();
        alert
    }

    /// Newest first.
    pub fn list(&self) -> Vec<Alert> {
        self.inner.read().alerts.iter().rev().cloned().collect()
    }

    pub fn unacknowledged(&self) -> Vec<Alert> {
        self.inner
            .read()
            .alerts
            .iter()
            .rev()
            .filter(|a| !a.acknowledged)
            .cloned()
            .collect()
    }

    pub fn unacknowledged_count(&self) -> usize {
        self.inner
            .read()
            .alerts
            .iter()
            .filter(|a| !a.acknowledged)
            .count()
    }

    pub fn by_category(&self, category: &str) -> Vec<Alert> {
        self.inner
            .read()
            .alerts
            .iter()
            .rev()
            .filter(|a| a.category == category)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Result<Alert, AlertError> {
        self.inner
            .read()
            .alerts
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| AlertError::not_found(id))
    }

    /// Acknowledging twice is fine; the alert simply stays acknowledged.
    pub fn acknowledge(&self, id: &str) -> Result<Alert, AlertError> {
        let acknowledged = {
            let mut g = self.inner.write();
            let alert = g
                .alerts
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or_else(|| AlertError::not_found(id))?;
            alert.acknowledged = true;
            alert.clone()
        };
        self.persist();
        Ok(acknowledged)
    }

    /// Returns how many alerts changed state.
    pub fn acknowledge_all(&self) -> usize {
        let mut changed = 0;
        {
            let mut g = self.inner.write();
            for alert in g.alerts.iter_mut().filter(|a| !a.acknowledged) {
                alert.acknowledged = true;
                changed += 1;
            }
        }
        if changed > 0 {
            self.persist();
        }
        changed
    }

    pub fn len(&self) -> usize {
        self.inner.read().alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().alerts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::{EntityKind, EntityRef};
    use matches::assert_matches;
    use serde_json::json;

    fn info(message: &str) -> NewAlert {
        NewAlert::new(AlertSeverity::Info, "registry", "registry", message)
    }

    #[test]
    fn emit_stores_unacknowledged_alert_newest_first() {
        let alerts = AlertService::new();
        alerts.emit(info("first"));
        let second = alerts.emit(
            NewAlert::new(AlertSeverity::Error, "executor", "job", "second")
                .with_details(json!({"records": 3}))
                .related_to(EntityRef::new(EntityKind::Job, "job-1")),
        );

        let listed = alerts.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[0].details, Some(json!({"records": 3})));
        assert_eq!(
            listed[0].related,
            Some(EntityRef::new(EntityKind::Job, "job-1"))
        );
        assert!(listed.iter().all(|a| !a.acknowledged));
        assert_eq!(alerts.unacknowledged_count(), 2);
    }

    #[test]
    fn acknowledge_marks_alert_and_is_idempotent() {
        let alerts = AlertService::new();
        let alert = alerts.emit(info("created"));

        let acked = alerts.acknowledge(&alert.id).expect("ack");
        assert!(acked.acknowledged);
        let again = alerts.acknowledge(&alert.id).expect("second ack");
        assert!(again.acknowledged);
        assert!(alerts.unacknowledged().is_empty());
    }

    #[test]
    fn acknowledge_unknown_alert_is_not_found() {
        let alerts = AlertService::new();
        let err = alerts.acknowledge("nope").expect_err("unknown id");
        assert_matches!(err, AlertError::NotFound { .. });
    }

    #[test]
    fn acknowledge_all_counts_changes() {
        let alerts = AlertService::new();
        let first = alerts.emit(info("a"));
        alerts.emit(info("b"));
        alerts.emit(info("c"));
        alerts.acknowledge(&first.id).expect("ack");

        assert_eq!(alerts.acknowledge_all(), 2);
        assert_eq!(alerts.acknowledge_all(), 0);
    }

    #[test]
    fn retention_drops_oldest_alerts() {
        let alerts = AlertService::with_max_alerts(2);
        alerts.emit(info("a"));
        alerts.emit(info("b"));
        alerts.emit(info("c"));

        let messages: Vec<_> = alerts.list().into_iter().map(|a| a.message).collect();
        assert_eq!(messages, vec!["c", "b"]);
    }

    #[test]
    fn by_category_filters() {
        let alerts = AlertService::new();
        alerts.emit(info("registered"));
        alerts.emit(NewAlert::new(
            AlertSeverity::Warning,
            "batch-coordinator",
            "batch",
            "1 of 2 jobs failed",
        ));
        assert_eq!(alerts.by_category("batch").len(), 1);
        assert_eq!(alerts.by_category("registry").len(), 1);
    }

    #[test]
    fn flush_and_reload_keeps_acknowledgements() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("alerts.json");
        let alerts = AlertService::new();
        let alert = alerts.emit(info("persist me"));
        alerts.acknowledge(&alert.id).expect("ack");
        alerts.flush_to(&path).expect("flush");

        let reloaded = AlertService::load_from(&path, 10).expect("load");
        let stored = reloaded.get(&alert.id).expect("stored");
        assert!(stored.acknowledged);
        assert_eq!(stored.message, "persist me");
    }

    #[test]
    fn opened_service_writes_through() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("alerts.json");
        let alerts = AlertService::open(&path, 10).expect("open");
        let alert = alerts.emit(info("written"));

        let reloaded = AlertService::load_from(&path, 10).expect("load");
        assert_eq!(reloaded.get(&alert.id).expect("stored").message, "written");
    }
}
