//! Pipeline spec files: YAML documents declaring data sources,
//! transformations and jobs to register at start-up.
//!
//! ```yaml
//! dataSources:
//!   - id: orders
//!     name: Orders export
//!     config: { type: file, path: data/orders.jsonl, format: jsonLines }
//! jobs:
//!   - id: nightly-orders
//!     name: Nightly orders
//!     source: orders
//!     destinations: [warehouse]
//! ```

use crate::{
    CatalogEntity, CatalogError, Getter, MemoryCatalog, NewDataSource, NewJob, NewTransformation,
    Register,
};
use common::error::ConfigError;
use common::utils::paths_with_ext;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineSpec {
    pub data_sources: Vec<NewDataSource>,
    pub transformations: Vec<NewTransformation>,
    pub jobs: Vec<NewJob>,
}

impl PipelineSpec {
    pub fn merge(&mut self, other: PipelineSpec) {
        self.data_sources.extend(other.data_sources);
        self.transformations.extend(other.transformations);
        self.jobs.extend(other.jobs);
    }

    pub fn is_empty(&self) -> bool {
        self.data_sources.is_empty() && self.transformations.is_empty() && self.jobs.is_empty()
    }

    // entries reference each other by id, so every entry must carry one
    fn validate(&self) -> Result<(), CatalogError> {
        let missing = self
            .data_sources
            .iter()
            .filter(|s| s.id.is_none())
            .map(|s| format!("data source '{}'", s.name))
            .chain(
                self.transformations
                    .iter()
                    .filter(|t| t.id.is_none())
                    .map(|t| format!("transformation '{}'", t.name)),
            )
            .chain(
                self.jobs
                    .iter()
                    .filter(|j| j.id.is_none())
                    .map(|j| format!("job '{}'", j.name)),
            )
            .collect::<Vec<_>>();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::invalid_spec(format!(
                "entries without an id: {}",
                missing.join(", ")
            )))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecSummary {
    pub registered: usize,
    /// entries whose id was already present (e.g. restored from a state file)
    pub skipped: usize,
}

pub fn parse_spec(yaml: &str) -> Result<PipelineSpec, CatalogError> {
    if yaml.trim().is_empty() {
        return Ok(PipelineSpec::default());
    }
    let spec: PipelineSpec = serde_yaml::from_str(yaml)?;
    spec.validate()?;
    Ok(spec)
}

/// Load and merge every `*.yml` / `*.yaml` file below `dir`, in path order.
pub fn load_specs(dir: &Path) -> Result<PipelineSpec, CatalogError> {
    if !dir.is_dir() {
        return Err(CatalogError::invalid_spec(format!(
            "spec directory '{}' does not exist",
            dir.display()
        )));
    }

    let mut paths = paths_with_ext(dir, "yml").map_err(ConfigError::from)?;
    paths.extend(paths_with_ext(dir, "yaml").map_err(ConfigError::from)?);
    paths.sort();

    let mut merged = PipelineSpec::default();
    for path in paths {
        log::info!("loading pipeline spec from {}", path.display());
        let raw = std::fs::read_to_string(&path)?;
        let spec = parse_spec(&raw).map_err(|e| {
            CatalogError::invalid_spec(format!("{} (file: {})", e, path.display()))
        })?;
        merged.merge(spec);
    }
    Ok(merged)
}

impl MemoryCatalog {
    /// Register a spec: data sources, then transformations, then jobs.
    /// Ids already present are left untouched.
    pub fn register_spec(&self, spec: PipelineSpec) -> Result<SpecSummary, CatalogError> {
        spec.validate()?;
        let mut summary = SpecSummary::default();

        for source in spec.data_sources {
            let id = source.id.clone().unwrap_or_default();
            if self.get_data_source(&id).is_ok() {
                log::info!("{} '{}' already registered", CatalogEntity::DataSource, id);
                summary.skipped += 1;
                continue;
            }
            self.create_data_source(source)?;
            summary.registered += 1;
        }

        for transformation in spec.transformations {
            let id = transformation.id.clone().unwrap_or_default();
            if self.get_transformation(&id).is_ok() {
                log::info!("{} '{}' already registered", CatalogEntity::Transformation, id);
                summary.skipped += 1;
                continue;
            }
            self.create_transformation(transformation)?;
            summary.registered += 1;
        }

        for job in spec.jobs {
            let id = job.id.clone().unwrap_or_default();
            if self.get_job(&id).is_ok() {
                log::info!("{} '{}' already registered", CatalogEntity::Job, id);
                summary.skipped += 1;
                continue;
            }
            self.create_job(job)?;
            summary.registered += 1;
        }

        Ok(summary)
    }
}
