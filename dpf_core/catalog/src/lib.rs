pub mod error;
pub mod models;
pub mod spec;

pub use error::CatalogError;
pub use models::*;
pub use spec::{load_specs, parse_spec, PipelineSpec, SpecSummary};

use alerts::{AlertService, AlertSeverity, NewAlert};
use chrono::{DateTime, Utc};
use common::types::{EntityKind, EntityRef};
use common::utils::{read_json_or_default, write_json_atomic};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const ALERT_SOURCE: &str = "registry";

/// The three registries held by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CatalogEntity {
    Job,
    DataSource,
    Transformation,
}
impl CatalogEntity {
    pub fn entity_kind(self) -> EntityKind {
        match self {
            CatalogEntity::Job => EntityKind::Job,
            CatalogEntity::DataSource => EntityKind::DataSource,
            CatalogEntity::Transformation => EntityKind::Transformation,
        }
    }
}
impl Display for CatalogEntity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.entity_kind().fmt(f)
    }
}

/// internal flat state (easy to serde), each registry in insertion order
#[derive(Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct State {
    jobs: Vec<Job>,
    data_sources: Vec<DataSource>,
    transformations: Vec<Transformation>,
}

/// In-memory registry of jobs, data sources and transformations.
///
/// Cheap to clone; all clones share one `RwLock`ed state so readers (executor,
/// status aggregator) always see whole mutations. Opened with
/// [`MemoryCatalog::open`] every mutation is also flushed to a JSON state file.
#[derive(Clone)]
pub struct MemoryCatalog {
    inner: Arc<RwLock<State>>,
    alerts: AlertService,
    state_file: Option<Arc<PathBuf>>,
}

impl MemoryCatalog {
    pub fn new(alerts: AlertService) -> Self {
        Self {
            inner: Arc::new(RwLock::new(State::default())),
            alerts,
            state_file: None,
        }
    }

    /// Catalog backed by `path`: loaded now, rewritten after every mutation.
    pub fn open(path: impl Into<PathBuf>, alerts: AlertService) -> Result<Self, CatalogError> {
        let path = path.into();
        let mut catalog = Self::load_from(&path, alerts)?;
        catalog.state_file = Some(Arc::new(path));
        Ok(catalog)
    }

    /* ---------- optional durability ---------- */
    pub fn load_from(path: &Path, alerts: AlertService) -> Result<Self, CatalogError> {
        let state: State = read_json_or_default(path)?;
        Ok(Self {
            inner: Arc::new(RwLock::new(state)),
            alerts,
            state_file: None,
        })
    }
    pub fn flush_to(&self, path: &Path) -> Result<(), CatalogError> {
        write_json_atomic(path, &*self.inner.upgradable_read())?;
        Ok(())
    }

    pub fn alerts(&self) -> &AlertService {
        &self.alerts
    }

    fn persist(&self) {
        if let Some(path) = &self.state_file {
            if let Err(e) = self.flush_to(path) {
                log::error!("failed to persist catalog to {}: {}", path.display(), e);
            }
        }
    }

    fn announce(&self, entity: CatalogEntity, id: &str, name: &str) {
        self.alerts.emit(
            NewAlert::new(
                AlertSeverity::Info,
                ALERT_SOURCE,
                ALERT_SOURCE,
                format!("Created {entity} '{name}'"),
            )
            .related_to(EntityRef::new(entity.entity_kind(), id)),
        );
    }
}

pub trait Register: Send + Sync + 'static {
    fn create_data_source(&self, new: NewDataSource) -> Result<DataSource, CatalogError>;
    fn create_transformation(
        &self,
        new: NewTransformation,
    ) -> Result<Transformation, CatalogError>;
    fn create_job(&self, new: NewJob) -> Result<Job, CatalogError>;

    /// Returns `false` when no such entity exists; that case is a logged no-op.
    fn set_enabled(&self, entity: CatalogEntity, id: &str, enabled: bool) -> bool;
    /// Returns whether something was removed; deleting twice is fine.
    fn delete(&self, entity: CatalogEntity, id: &str) -> bool;
    /// Record a successful load into data source `id`.
    fn mark_synced(&self, id: &str, at: DateTime<Utc>) -> bool;

    fn enable(&self, entity: CatalogEntity, id: &str) -> bool {
        self.set_enabled(entity, id, true)
    }
    fn disable(&self, entity: CatalogEntity, id: &str) -> bool {
        self.set_enabled(entity, id, false)
    }
}

pub trait Getter: Send + Sync + 'static {
    fn get_job(&self, id: &str) -> Result<Job, CatalogError>;
    fn get_data_source(&self, id: &str) -> Result<DataSource, CatalogError>;
    fn get_transformation(&self, id: &str) -> Result<Transformation, CatalogError>;
    fn list_jobs(&self) -> Vec<Job>;
    fn list_data_sources(&self) -> Vec<DataSource>;
    fn list_transformations(&self) -> Vec<Transformation>;
    fn counts(&self) -> CatalogCounts;
}

/// Everything the executor and the API need from a registry backend.
pub trait Catalog: Register + Getter {}
impl<T: Register + Getter> Catalog for T {}

impl Register for MemoryCatalog {
    fn create_data_source(&self, new: NewDataSource) -> Result<DataSource, CatalogError> {
        let source = new.into_data_source();
        {
            let mut g = self.inner.write();
            if g.data_sources.iter().any(|s| s.id == source.id) {
                return Err(CatalogError::duplicate(CatalogEntity::DataSource, &source.id));
            }
            g.data_sources.push(source.clone());
        }
        self.persist();
        self.announce(CatalogEntity::DataSource, &source.id, &source.name);
        Ok(source)
    }

    fn create_transformation(
        &self,
        new: NewTransformation,
    ) -> Result<Transformation, CatalogError> {
        let transformation = new.into_transformation();
        {
            let mut g = self.inner.write();
            if g.transformations.iter().any(|t| t.id == transformation.id) {
                return Err(CatalogError::duplicate(
                    CatalogEntity::Transformation,
                    &transformation.id,
                ));
            }
            g.transformations.push(transformation.clone());
        }
        self.persist();
        self.announce(
            CatalogEntity::Transformation,
            &transformation.id,
            &transformation.name,
        );
        Ok(transformation)
    }

    fn create_job(&self, new: NewJob) -> Result<Job, CatalogError> {
        let job = new.into_job();
        {
            let mut g = self.inner.write();
            if g.jobs.iter().any(|j| j.id == job.id) {
                return Err(CatalogError::duplicate(CatalogEntity::Job, &job.id));
            }
            g.jobs.push(job.clone());
        }
        self.persist();
        self.announce(CatalogEntity::Job, &job.id, &job.name);
        Ok(job)
    }

    fn set_enabled(&self, entity: CatalogEntity, id: &str, enabled: bool) -> bool {
        let now = Utc::now();
        let (found, changed) = {
            let mut g = self.inner.write();
            match entity {
                CatalogEntity::Job => match g.jobs.iter_mut().find(|j| j.id == id) {
                    Some(job) if job.enabled != enabled => {
                        job.enabled = enabled;
                        job.updated_at = now;
                        (true, true)
                    }
                    Some(_) => (true, false),
                    None => (false, false),
                },
                CatalogEntity::Transformation => {
                    match g.transformations.iter_mut().find(|t| t.id == id) {
                        Some(t) if t.enabled != enabled => {
                            t.enabled = enabled;
                            t.updated_at = now;
                            (true, true)
                        }
                        Some(_) => (true, false),
                        None => (false, false),
                    }
                }
                CatalogEntity::DataSource => {
                    let status = if enabled {
                        DataSourceStatus::Active
                    } else {
                        DataSourceStatus::Inactive
                    };
                    match g.data_sources.iter_mut().find(|s| s.id == id) {
                        Some(s) if s.status != status => {
                            s.status = status;
                            s.updated_at = now;
                            (true, true)
                        }
                        Some(_) => (true, false),
                        None => (false, false),
                    }
                }
            }
        };

        if !found {
            let verb = if enabled { "enable" } else { "disable" };
            log::warn!("cannot {verb} {entity} '{id}': not registered, ignoring");
        }
        if changed {
            self.persist();
        }
        found
    }

    fn delete(&self, entity: CatalogEntity, id: &str) -> bool {
        let removed = {
            let mut g = self.inner.write();
            match entity {
                CatalogEntity::Job => remove_where(&mut g.jobs, |j| j.id == id),
                CatalogEntity::DataSource => remove_where(&mut g.data_sources, |s| s.id == id),
                CatalogEntity::Transformation => {
                    remove_where(&mut g.transformations, |t| t.id == id)
                }
            }
        };

        if removed {
            self.persist();
        } else {
            log::warn!("cannot delete {entity} '{id}': not registered, ignoring");
        }
        removed
    }

    fn mark_synced(&self, id: &str, at: DateTime<Utc>) -> bool {
        let found = {
            let mut g = self.inner.write();
            match g.data_sources.iter_mut().find(|s| s.id == id) {
                Some(source) => {
                    source.last_sync_date = Some(at);
                    source.updated_at = at;
                    true
                }
                None => false,
            }
        };
        if found {
            self.persist();
        }
        found
    }
}

fn remove_where<T>(items: &mut Vec<T>, pred: impl Fn(&T) -> bool) -> bool {
    let before = items.len();
    items.retain(|item| !pred(item));
    items.len() != before
}

impl Getter for MemoryCatalog {
    fn get_job(&self, id: &str) -> Result<Job, CatalogError> {
        self.inner
            .read()
            .jobs
            .iter()
            .find(|j| j.id == id)
            .cloned()
            .ok_or_else(|| CatalogError::not_found(CatalogEntity::Job, id))
    }

    fn get_data_source(&self, id: &str) -> Result<DataSource, CatalogError> {
        self.inner
            .read()
            .data_sources
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| CatalogError::not_found(CatalogEntity::DataSource, id))
    }

    fn get_transformation(&self, id: &str) -> Result<Transformation, CatalogError> {
        self.inner
            .read()
            .transformations
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| CatalogError::not_found(CatalogEntity::Transformation, id))
    }

    fn list_jobs(&self) -> Vec<Job> {
        self.inner.read().jobs.clone()
    }

    fn list_data_sources(&self) -> Vec<DataSource> {
        self.inner.read().data_sources.clone()
    }

    fn list_transformations(&self) -> Vec<Transformation> {
        self.inner.read().transformations.clone()
    }

    fn counts(&self) -> CatalogCounts {
        let g = self.inner.read();
        CatalogCounts {
            jobs: EntityCount {
                total: g.jobs.len(),
                enabled: g.jobs.iter().filter(|j| j.enabled).count(),
            },
            data_sources: EntityCount {
                total: g.data_sources.len(),
                enabled: g.data_sources.iter().filter(|s| s.is_active()).count(),
            },
            transformations: EntityCount {
                total: g.transformations.len(),
                enabled: g.transformations.iter().filter(|t| t.enabled).count(),
            },
        }
    }
}
