use common::types::Record;
use parking_lot::RwLock;
use serde_json::Value as Json;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Signature of a `custom` transformation: the whole dataset in, a new
/// dataset out. `args` comes from the transformation config.
pub type CustomFn = dyn Fn(Vec<Record>, &Json) -> Result<Vec<Record>, String> + Send + Sync;

/// Named functions available to `custom` transformations. Clones share the
/// same table.
#[derive(Clone, Default)]
pub struct CustomFunctions {
    inner: Arc<RwLock<HashMap<String, Arc<CustomFn>>>>,
}

impl Debug for CustomFunctions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomFunctions")
            .field("names", &self.names())
            .finish()
    }
}

impl CustomFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(Vec<Record>, &Json) -> Result<Vec<Record>, String> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.inner.write().insert(name.clone(), Arc::new(f)).is_some() {
            log::warn!("custom function '{name}' was replaced");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<CustomFn>> {
        self.inner.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.inner.read().keys().cloned().collect();
        names.sort();
        names
    }
}
