use crate::run::{JobRun, RunStatus};
use crate::ExecutorError;
use common::utils::{read_json_or_default, write_json_atomic};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where job runs live between and after executions.
pub trait RunStore: Send + Sync + 'static {
    /// Insert or replace by run id.
    fn save(&self, run: &JobRun);
    fn get(&self, run_id: &str) -> Option<JobRun>;
    /// Oldest first.
    fn list(&self) -> Vec<JobRun>;

    fn for_job(&self, job_id: &str) -> Vec<JobRun> {
        self.list()
            .into_iter()
            .filter(|r| r.job_id == job_id)
            .collect()
    }

    fn running(&self) -> usize {
        self.list()
            .iter()
            .filter(|r| r.status == RunStatus::Running)
            .count()
    }
}

#[derive(Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct State {
    job_runs: Vec<JobRun>,
}

impl State {
    // oldest finished runs go first; RUNNING runs are never evicted
    fn evict(&mut self, max_runs: usize) {
        let mut overflow = self.job_runs.len().saturating_sub(max_runs);
        if overflow == 0 {
            return;
        }
        self.job_runs.retain(|r| {
            if overflow > 0 && r.is_terminal() {
                overflow -= 1;
                false
            } else {
                true
            }
        });
    }
}

pub const DEFAULT_MAX_RUNS: usize = 1000;

#[derive(Clone)]
pub struct MemoryRunStore {
    inner: Arc<RwLock<State>>,
    max_runs: usize,
    state_file: Option<Arc<PathBuf>>,
}

impl Default for MemoryRunStore {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(State::default())),
            max_runs: DEFAULT_MAX_RUNS,
            state_file: None,
        }
    }
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max_runs` runs, dropping the oldest finished ones.
    pub fn with_max_runs(mut self, max_runs: usize) -> Self {
        self.max_runs = max_runs.max(1);
        self.inner.write().evict(self.max_runs);
        self
    }

    /// Store backed by `path`. Runs left RUNNING by a previous process are
    /// closed as ABORTED on load.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ExecutorError> {
        let path = path.into();
        let mut store = Self::load_from(&path)?;
        store.state_file = Some(Arc::new(path));
        Ok(store)
    }

    pub fn load_from(path: &Path) -> Result<Self, ExecutorError> {
        let mut state: State = read_json_or_default(path)?;
        for run in state.job_runs.iter_mut().filter(|r| !r.is_terminal()) {
            run.error("Run interrupted by a restart");
            run.finish(RunStatus::Aborted, Some("interrupted by restart".to_string()))?;
        }
        Ok(Self {
            inner: Arc::new(RwLock::new(state)),
            max_runs: DEFAULT_MAX_RUNS,
            state_file: None,
        })
    }

    /// Writers are serialised so a stale snapshot never replaces a newer one.
    pub fn flush_to(&self, path: &Path) -> Result<(), ExecutorError> {
        write_json_atomic(path, &*self.inner.upgradable_read())?;
        Ok(())
    }

    fn persist(&self) {
        if let Some(path) = &self.state_file {
            if let Err(e) = self.flush_to(path) {
                log::error!("failed to persist job runs to {}: {}", path.display(), e);
            }
        }
    }
}

impl RunStore for MemoryRunStore {
    fn save(&self, run: &JobRun) {
        {
            let mut g = self.inner.write();
            match g.job_runs.iter_mut().find(|r| r.id == run.id) {
                Some(existing) => *existing = run.clone(),
                None => {
                    g.job_runs.push(run.clone());
                    g.evict(self.max_runs);
                }
            }
        }
        self.persist();
    }

    fn get(&self, run_id: &str) -> Option<JobRun> {
        self.inner
            .read()
            .job_runs
            .iter()
            .find(|r| r.id == run_id)
            .cloned()
    }

    fn list(&self) -> Vec<JobRun> {
        self.inner.read().job_runs.clone()
    }

    fn for_job(&self, job_id: &str) -> Vec<JobRun> {
        self.inner
            .read()
            .job_runs
            .iter()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{Job, JobSettings, Schedule};
    use chrono::Utc;

    fn job(id: &str) -> Job {
        Job {
            id: id.into(),
            name: id.into(),
            sources: vec!["a".into()],
            transformations: vec![],
            destinations: vec![],
            schedule: Schedule::Manual,
            settings: JobSettings::default(),
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn save_replaces_by_id_and_keeps_order() {
        let store = MemoryRunStore::new();
        let mut first = JobRun::start(&job("a"));
        let second = JobRun::start(&job("b"));
        store.save(&first);
        store.save(&second);

        first.finish(RunStatus::Success, None).expect("finish");
        store.save(&first);

        let runs = store.list();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, first.id);
        assert_eq!(runs[0].status, RunStatus::Success);
        assert_eq!(store.for_job("b").len(), 1);
        assert_eq!(store.running(), 1);
    }

    #[test]
    fn reopening_aborts_interrupted_runs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("runs.json");
        let store = MemoryRunStore::open(&path).expect("open");
        let run = JobRun::start(&job("a"));
        store.save(&run);

        let reopened = MemoryRunStore::open(&path).expect("reopen");
        let restored = reopened.get(&run.id).expect("persisted");
        assert_eq!(restored.status, RunStatus::Aborted);
        assert!(restored.end_time.is_some());
    }

    fn finished(id: &str) -> JobRun {
        let mut run = JobRun::start(&job(id));
        run.finish(RunStatus::Success, None).expect("finish");
        run
    }

    #[test]
    fn oldest_finished_runs_are_evicted_beyond_the_cap() {
        let store = MemoryRunStore::new().with_max_runs(3);
        let running = JobRun::start(&job("busy"));
        store.save(&running);
        let first = finished("a");
        store.save(&first);
        for id in ["b", "c", "d"] {
            store.save(&finished(id));
        }

        let runs = store.list();
        assert_eq!(runs.len(), 3);
        // the RUNNING run survives even though it is the oldest
        assert_eq!(runs[0].id, running.id);
        assert!(store.get(&first.id).is_none());
        assert!(store.for_job("b").is_empty());
        assert_eq!(store.for_job("d").len(), 1);
    }

    #[test]
    fn cap_is_applied_to_reopened_history() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("runs.json");
        let store = MemoryRunStore::open(&path).expect("open");
        for id in ["a", "b", "c", "d"] {
            store.save(&finished(id));
        }

        let reopened = MemoryRunStore::open(&path).expect("reopen").with_max_runs(2);
        let jobs: Vec<_> = reopened.list().into_iter().map(|r| r.job_id).collect();
        assert_eq!(jobs, vec!["c", "d"]);
    }
}
