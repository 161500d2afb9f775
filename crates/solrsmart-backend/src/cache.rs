use parking_lot::RwLock;
use solrsmart_core::FieldCatalog;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{Duration, Instant};

pub const DEFAULT_SCHEMA_TTL: Duration = Duration::from_secs(600);

/// Per-collection field catalogs with a single expiry duration.
///
/// An entry is served while `now - fetched_at < ttl`, so a zero TTL never
/// serves anything. Lookups take the read lock only; nothing here awaits.
#[derive(Clone)]
pub struct SchemaCache {
    inner: Arc<RwLock<Inner>>,
}

struct Inner {
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

struct CacheEntry {
    catalog: Arc<FieldCatalog>,
    fetched_at: Instant,
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA_TTL)
    }
}

impl SchemaCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                ttl,
                entries: HashMap::new(),
            })),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.read().ttl
    }

    pub fn get(&self, collection: &str) -> Option<Arc<FieldCatalog>> {
        let inner = self.inner.read();
        let entry = inner.entries.get(collection)?;
        if Instant::now().saturating_duration_since(entry.fetched_at) < inner.ttl {
            Some(entry.catalog.clone())
        } else {
            None
        }
    }

    /// Replaces any previous entry and restarts its clock.
    pub fn insert(&self, collection: &str, catalog: Arc<FieldCatalog>) {
        self.inner.write().entries.insert(
            collection.to_string(),
            CacheEntry {
                catalog,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Collections with a stored entry, fresh or not.
    pub fn collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
