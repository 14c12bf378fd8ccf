use crate::custom::CustomFunctions;
use crate::locks::{SourceGuard, SourceLocks};
use crate::run::{JobRun, JobRunResult, RunStatus};
use crate::store::RunStore;
use crate::transform;
use crate::ExecutorError;
use alerts::{AlertService, AlertSeverity, NewAlert};
use catalog::{Catalog, CatalogError, DataSource, Job, JoinReference, Transformation, TransformationConfig};
use chrono::Utc;
use common::types::{EntityKind, EntityRef, Record};
use parking_lot::Mutex;
use serde_json::json;
use shared_clients::{AdapterError, AdapterRegistry, SourceAdapter};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const ALERT_SOURCE: &str = "pipeline-executor";
const ALERT_CATEGORY: &str = "job";

/// How the three phases of a run ended.
enum Outcome {
    Success,
    Failed(String),
    Aborted(String),
}

/// Runs jobs through extract, transform and load.
///
/// Cheap to clone; clones share the run store, the per-source locks and the
/// table of in-flight runs, so a run started through one clone can be
/// cancelled through another.
#[derive(Clone)]
pub struct PipelineExecutor {
    catalog: Arc<dyn Catalog>,
    alerts: AlertService,
    adapters: Arc<AdapterRegistry>,
    runs: Arc<dyn RunStore>,
    custom: CustomFunctions,
    locks: SourceLocks,
    active: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl PipelineExecutor {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        alerts: AlertService,
        adapters: AdapterRegistry,
        runs: Arc<dyn RunStore>,
    ) -> Self {
        Self {
            catalog,
            alerts,
            adapters: Arc::new(adapters),
            runs,
            custom: CustomFunctions::new(),
            locks: SourceLocks::new(),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_custom_functions(mut self, custom: CustomFunctions) -> Self {
        self.custom = custom;
        self
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn alerts(&self) -> &AlertService {
        &self.alerts
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    pub fn run_store(&self) -> &Arc<dyn RunStore> {
        &self.runs
    }

    pub fn custom_functions(&self) -> &CustomFunctions {
        &self.custom
    }

    pub fn locks(&self) -> &SourceLocks {
        &self.locks
    }

    /// Execute one job to a terminal state.
    ///
    /// Returns `Err` only for pre-flight failures (unknown job, no sources),
    /// in which case no run is recorded. Failed runs come back as `Ok` with
    /// `success == false`.
    pub async fn execute_job(&self, job_id: &str) -> Result<JobRunResult, ExecutorError> {
        let job = match self.catalog.get_job(job_id) {
            Ok(job) => job,
            Err(CatalogError::NotFound { .. }) => return Err(ExecutorError::job_not_found(job_id)),
            Err(e) => return Err(e.into()),
        };
        if job.sources.is_empty() {
            return Err(ExecutorError::no_sources(&job.id));
        }

        let mut run = JobRun::start(&job);
        run.info(format!("Starting execution of job: {}", job.name));
        if !job.enabled {
            run.warn(format!("Job '{}' is disabled; running on explicit request", job.name));
        }
        self.runs.save(&run);

        let token = CancellationToken::new();
        self.active.lock().insert(run.id.clone(), token.clone());

        let timeout_ms = job.settings.timeout_ms;
        let lock_set = self.lock_set(&job);
        let outcome = {
            // waiting on another run's locks does not count against the deadline
            let work = async {
                let _guard = self.acquire_locks(lock_set, &mut run).await;
                with_deadline(timeout_ms, self.run_phases(&job, &mut run)).await
            };
            tokio::select! {
                biased;
                _ = token.cancelled() => Outcome::Aborted("Execution cancelled".to_string()),
                outcome = work => outcome,
            }
        };
        self.active.lock().remove(&run.id);

        self.finalize(&job, &mut run, outcome)?;
        Ok(JobRunResult::from(&run))
    }

    /// Request cancellation of an in-flight run. `false` when the run is
    /// unknown or already finished.
    pub fn cancel_run(&self, run_id: &str) -> bool {
        match self.active.lock().get(run_id) {
            Some(token) => {
                log::info!("cancellation requested for run {run_id}");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn get_run(&self, run_id: &str) -> Result<JobRun, ExecutorError> {
        self.runs
            .get(run_id)
            .ok_or_else(|| ExecutorError::run_not_found(run_id))
    }

    pub fn list_runs(&self) -> Vec<JobRun> {
        self.runs.list()
    }

    pub fn runs_for_job(&self, job_id: &str) -> Vec<JobRun> {
        self.runs.for_job(job_id)
    }

    /* ---------- phases ---------- */

    async fn acquire_locks(&self, ids: Vec<String>, run: &mut JobRun) -> SourceGuard {
        let busy: Vec<&str> = ids
            .iter()
            .map(String::as_str)
            .filter(|id| self.locks.is_locked(id))
            .collect();
        if busy.is_empty() {
            return self.locks.acquire(ids).await;
        }

        run.info(format!("Waiting for data source lock(s): {}", busy.join(", ")));
        self.runs.save(run);
        let guard = self.locks.acquire(ids).await;
        run.info("Data source locks acquired");
        guard
    }

    async fn run_phases(&self, job: &Job, run: &mut JobRun) -> Result<(), String> {
        let extracted = self.extract(job, run).await?;
        self.runs.save(run);

        let transformed = self.transform(job, run, extracted).await?;
        self.runs.save(run);

        self.load(job, run, transformed).await?;
        self.runs.save(run);
        Ok(())
    }

    // sources, destinations and data sources referenced by joins
    fn lock_set(&self, job: &Job) -> Vec<String> {
        let mut ids = job.touched_sources();
        for id in &job.transformations {
            if let Ok(Transformation {
                config:
                    TransformationConfig::Join {
                        reference: JoinReference::DataSource { id: source_id },
                        ..
                    },
                ..
            }) = self.catalog.get_transformation(id)
            {
                ids.push(source_id);
            }
        }
        ids
    }

    fn resolve(&self, run: &mut JobRun, id: &str, role: &str) -> Option<DataSource> {
        match self.catalog.get_data_source(id) {
            Ok(source) if source.is_active() => Some(source),
            Ok(source) => {
                run.warn(format!("{role} '{}' is inactive, skipping", source.name));
                None
            }
            Err(_) => {
                run.warn(format!("{role} {id} not found, skipping"));
                None
            }
        }
    }

    async fn extract(&self, job: &Job, run: &mut JobRun) -> Result<Vec<Record>, String> {
        run.info(format!("Extracting from {} source(s)", job.sources.len()));
        let mut records = Vec::new();

        for source_id in &job.sources {
            let Some(source) = self.resolve(run, source_id, "Data source") else {
                continue;
            };
            match self.extract_one(job, run, &source).await {
                Ok(batch) => {
                    run.info(format!("Extracted {} records from '{}'", batch.len(), source.name));
                    records.extend(batch);
                }
                Err(message) => {
                    run.metrics.records_error += 1;
                    run.error(format!("Extraction from '{}' failed: {message}", source.name));
                    if job.settings.stop_on_error {
                        return Err(message);
                    }
                    run.warn(format!("Skipping source '{}'", source.name));
                }
            }
        }

        run.metrics.records_processed = records.len();
        run.set_progress(33);
        run.info(format!(
            "Extraction phase completed: {} records",
            records.len()
        ));
        Ok(records)
    }

    /// Probe, then pull every record of one source.
    async fn extract_one(
        &self,
        job: &Job,
        run: &mut JobRun,
        source: &DataSource,
    ) -> Result<Vec<Record>, String> {
        let shared = self.adapters.resolve(source.kind()).map_err(|e| e.message().to_string())?;
        let adapter: &dyn SourceAdapter = shared.as_ref();
        let retries = job.settings.max_retries;

        let info = with_retries(
            run,
            retries,
            &format!("Connection to '{}'", source.name),
            move || adapter.probe(source),
        )
        .await
        .map_err(|e| e.message().to_string())?;
        run.info(format!(
            "Connected to '{}' ({} at {})",
            source.name, info.source_type, info.endpoint
        ));

        with_retries(
            run,
            retries,
            &format!("Extraction from '{}'", source.name),
            move || adapter.extract(source),
        )
        .await
        .map_err(|e| e.message().to_string())
    }

    async fn transform(
        &self,
        job: &Job,
        run: &mut JobRun,
        records: Vec<Record>,
    ) -> Result<Vec<Record>, String> {
        let mut dataset = if job.transformations.is_empty() {
            run.info("No transformations configured, skipping transform phase");
            records
        } else {
            self.apply_transformations(job, run, records).await?
        };

        if job.settings.validate_data {
            let before = dataset.len();
            dataset.retain(|r| r.values().any(|v| !v.is_null()));
            let dropped = before - dataset.len();
            run.metrics.records_skipped += dropped;
            if dropped > 0 {
                run.warn(format!("Validation dropped {dropped} empty records"));
            }
        }

        run.metrics.records_success = dataset.len();
        run.set_progress(66);
        Ok(dataset)
    }

    async fn apply_transformations(
        &self,
        job: &Job,
        run: &mut JobRun,
        records: Vec<Record>,
    ) -> Result<Vec<Record>, String> {
        let mut resolved = Vec::with_capacity(job.transformations.len());
        for id in &job.transformations {
            match self.catalog.get_transformation(id) {
                Ok(t) => resolved.push(t),
                Err(_) => run.warn(format!("Transformation {id} not found, skipping")),
            }
        }
        // stable: equal orders keep the job's reference order
        resolved.sort_by_key(|t| t.order);
        run.info(format!("Applying {} transformation(s)", resolved.len()));

        let stop_on_error = job.settings.stop_on_error;
        let mut dataset = records;
        for t in resolved {
            if !t.enabled {
                run.info(format!("Transformation '{}' is disabled, skipped", t.name));
                continue;
            }

            let input_len = dataset.len();
            let input = if stop_on_error {
                std::mem::take(&mut dataset)
            } else {
                dataset.clone()
            };
            let applied = match self.join_reference(&t, job, run).await {
                Ok(reference) => transform::apply(&t.config, input, reference.as_deref(), &self.custom)
                    .map_err(|e| e.message().to_string()),
                Err(e) => Err(e),
            };

            match applied {
                Ok(output) => {
                    run.info(format!(
                        "Applied {} transformation '{}': {} -> {} records",
                        t.kind(),
                        t.name,
                        input_len,
                        output.len()
                    ));
                    dataset = output;
                }
                Err(message) => {
                    run.metrics.records_error += 1;
                    run.error(format!("Transformation '{}' failed: {message}", t.name));
                    if stop_on_error {
                        return Err(message);
                    }
                }
            }
        }
        Ok(dataset)
    }

    async fn join_reference(
        &self,
        t: &Transformation,
        job: &Job,
        run: &mut JobRun,
    ) -> Result<Option<Vec<Record>>, String> {
        let TransformationConfig::Join {
            reference: JoinReference::DataSource { id },
            ..
        } = &t.config
        else {
            return Ok(None);
        };

        let source = self
            .catalog
            .get_data_source(id)
            .map_err(|_| format!("join reference data source {id} not found"))?;
        let shared = self.adapters.resolve(source.kind()).map_err(|e| e.message().to_string())?;
        let adapter: &dyn SourceAdapter = shared.as_ref();
        let src = &source;
        let records = with_retries(
            run,
            job.settings.max_retries,
            &format!("Reference extraction from '{}'", source.name),
            move || adapter.extract(src),
        )
        .await
        .map_err(|e| e.message().to_string())?;
        Ok(Some(records))
    }

    async fn load(&self, job: &Job, run: &mut JobRun, records: Vec<Record>) -> Result<(), String> {
        run.info(format!(
            "Loading {} records into {} destination(s)",
            records.len(),
            job.destinations.len()
        ));
        let mut persisted = 0;

        for destination_id in &job.destinations {
            let Some(destination) = self.resolve(run, destination_id, "Destination") else {
                continue;
            };
            match self.load_one(job, run, &destination, &records).await {
                Ok(written) => {
                    self.catalog.mark_synced(&destination.id, Utc::now());
                    run.info(format!("Loaded {written} records into '{}'", destination.name));
                    persisted += 1;
                }
                Err(message) => {
                    run.metrics.records_error += 1;
                    run.error(format!("Load into '{}' failed: {message}", destination.name));
                    if job.settings.stop_on_error {
                        return Err(message);
                    }
                    run.warn(format!("Skipping destination '{}'", destination.name));
                }
            }
        }

        if persisted == 0 {
            run.warn("No destinations resolved; transformed records were not persisted");
        }
        run.set_progress(100);
        Ok(())
    }

    /// Write `records` to one destination in `batchSize` chunks.
    async fn load_one(
        &self,
        job: &Job,
        run: &mut JobRun,
        destination: &DataSource,
        records: &[Record],
    ) -> Result<usize, String> {
        let shared = self
            .adapters
            .resolve(destination.kind())
            .map_err(|e| e.message().to_string())?;
        let adapter: &dyn SourceAdapter = shared.as_ref();
        let batch_size = job.settings.batch_size.max(1);

        let mut written = 0;
        for chunk in records.chunks(batch_size) {
            written += with_retries(
                run,
                job.settings.max_retries,
                &format!("Load into '{}'", destination.name),
                move || adapter.load(destination, chunk),
            )
            .await
            .map_err(|e| e.message().to_string())?;
        }
        Ok(written)
    }

    /* ---------- finalisation ---------- */

    fn finalize(&self, job: &Job, run: &mut JobRun, outcome: Outcome) -> Result<(), ExecutorError> {
        let related = EntityRef::new(EntityKind::JobRun, run.id.clone());
        match outcome {
            Outcome::Success => {
                run.info("Job execution completed successfully");
                run.finish(RunStatus::Success, None)?;
                if job.settings.alert_on_success {
                    self.alerts.emit(
                        NewAlert::new(
                            AlertSeverity::Success,
                            ALERT_SOURCE,
                            ALERT_CATEGORY,
                            format!(
                                "Job '{}' completed: {} records processed in {}ms",
                                job.name,
                                run.metrics.records_processed,
                                run.metrics.execution_time_ms
                            ),
                        )
                        .with_details(json!({
                            "jobId": job.id,
                            "metrics": run.metrics,
                        }))
                        .related_to(related),
                    );
                }
            }
            Outcome::Failed(message) => {
                run.error(format!("Job execution failed: {message}"));
                run.finish(RunStatus::Error, Some(message.clone()))?;
                self.alert_failure(job, "failed", &message, run, related);
            }
            Outcome::Aborted(message) => {
                run.error(format!("Job execution aborted: {message}"));
                run.finish(RunStatus::Aborted, Some(message.clone()))?;
                self.alert_failure(job, "was aborted", &message, run, related);
            }
        }
        self.runs.save(run);
        Ok(())
    }

    fn alert_failure(&self, job: &Job, what: &str, message: &str, run: &JobRun, related: EntityRef) {
        if !job.settings.alert_on_failure {
            return;
        }
        self.alerts.emit(
            NewAlert::new(
                AlertSeverity::Error,
                ALERT_SOURCE,
                ALERT_CATEGORY,
                format!("Job '{}' {what}: {message}", job.name),
            )
            .with_details(json!({
                "jobId": job.id,
                "status": run.status,
                "metrics": run.metrics,
            }))
            .related_to(related),
        );
    }
}

async fn with_deadline<F>(timeout_ms: u64, phases: F) -> Outcome
where
    F: Future<Output = Result<(), String>>,
{
    let result = if timeout_ms == 0 {
        phases.await
    } else {
        match tokio::time::timeout(Duration::from_millis(timeout_ms), phases).await {
            Ok(result) => result,
            Err(_) => return Outcome::Aborted(format!("Execution timed out after {timeout_ms}ms")),
        }
    };
    match result {
        Ok(()) => Outcome::Success,
        Err(message) => Outcome::Failed(message),
    }
}

/// Retry `op` up to `retries` extra times, logging each retry on the run.
async fn with_retries<T, F, Fut>(
    run: &mut JobRun,
    retries: u32,
    what: &str,
    mut op: F,
) -> Result<T, AdapterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AdapterError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < retries => {
                attempt += 1;
                run.warn(format!(
                    "{what} failed: {}; retrying ({attempt}/{retries})",
                    err.message()
                ));
            }
            Err(err) => return Err(err),
        }
    }
}
