use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per data source id.
///
/// A run takes the locks of every source it reads or writes before its
/// extract phase and holds them until it is finalised. Ids are always
/// acquired in sorted order.
#[derive(Clone, Default)]
pub struct SourceLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

#[must_use = "locks are released when the guard is dropped"]
pub struct SourceGuard {
    ids: Vec<String>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl SourceGuard {
    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}

impl SourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, id: &str) -> Arc<AsyncMutex<()>> {
        self.inner
            .lock()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    pub async fn acquire<I, S>(&self, ids: I) -> SourceGuard
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        ids.sort();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in &ids {
            let lock = self.lock_for(id);
            guards.push(lock.lock_owned().await);
        }
        SourceGuard {
            ids,
            _guards: guards,
        }
    }

    /// Whether someone currently holds the lock for `id`.
    pub fn is_locked(&self, id: &str) -> bool {
        self.inner
            .lock()
            .get(id)
            .is_some_and(|l| l.try_lock().is_err())
    }
}
