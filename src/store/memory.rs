//! In-memory module store for testing.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::ModuleStore;

/// Error type for in-memory store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryError {
    /// Writes were disabled with [`InMemoryModuleStore::fail_writes`].
    #[error("Store is read-only: {0}")]
    ReadOnly(String),
}

#[derive(Debug, Default)]
struct Inner {
    modules: BTreeMap<String, String>,
    /// Number of writes per module name.
    writes: BTreeMap<String, usize>,
    read_only: bool,
}

/// In-memory module store for testing.
///
/// Uses BTreeMap for deterministic iteration order and counts writes per
/// module so callers can assert which modules were regenerated.
#[derive(Debug, Default)]
pub struct InMemoryModuleStore {
    inner: RwLock<Inner>,
}

impl InMemoryModuleStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.inner.write().read_only = fail;
    }

    /// Number of writes performed for `name` since creation.
    pub fn write_count(&self, name: &str) -> usize {
        self.inner.read().writes.get(name).copied().unwrap_or(0)
    }

    /// Names of all stored modules.
    pub fn names(&self) -> Vec<String> {
        self.inner.read().modules.keys().cloned().collect()
    }

    /// Get number of stored modules.
    pub fn num_modules(&self) -> usize {
        self.inner.read().modules.len()
    }

    /// Current text of a module.
    pub fn get(&self, name: &str) -> Option<String> {
        self.inner.read().modules.get(name).cloned()
    }
}

#[async_trait]
impl ModuleStore for InMemoryModuleStore {
    type Error = InMemoryError;

    async fn write_module(&self, name: &str, text: &str) -> Result<String, Self::Error> {
        let mut inner = self.inner.write();
        if inner.read_only {
            return Err(InMemoryError::ReadOnly(name.to_string()));
        }
        inner.modules.insert(name.to_string(), text.to_string());
        *inner.writes.entry(name.to_string()).or_default() += 1;
        Ok(self.location(name))
    }

    async fn read_module(&self, name: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.get(name))
    }

    fn location(&self, name: &str) -> String {
        format!("memory://{name}")
    }

    async fn clear(&self) -> Result<(), Self::Error> {
        self.inner.write().modules.clear();
        Ok(())
    }
}
