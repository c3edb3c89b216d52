use std::time::Duration;

use dashmap::DashMap;
use shroud_dag::Dag;
use shroud_doc::Document;
use tokio::time::Instant;

use crate::cache::CacheEntry;

/// Per-key DAGs and cached documents owned by one `MetadataAccess`.
///
/// Keys are base64 public keys. A cached document is only served while the
/// matching DAG is present, since the next write appends to that DAG.
#[derive(Default)]
pub struct MetadataStore {
    dags: DashMap<String, Dag>,
    cache: DashMap<String, CacheEntry>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dag(&self, key: &str) -> Option<Dag> {
        self.dags.get(key).map(|dag| dag.clone())
    }

    /// Cached document for `key`, if fresh. The outer `None` is a miss.
    pub fn cached(&self, key: &str, now: Instant, ttl: Duration) -> Option<Option<Document>> {
        if !self.dags.contains_key(key) {
            return None;
        }
        let entry = self.cache.get(key)?;
        entry
            .is_fresh(now, ttl)
            .then(|| entry.document.clone())
    }

    /// Replace the DAG and cached document for `key`.
    pub fn put(&self, key: &str, dag: Dag, entry: CacheEntry) {
        self.dags.insert(key.to_string(), dag);
        self.cache.insert(key.to_string(), entry);
    }

    pub fn mark_dirty(&self, key: &str) {
        if let Some(mut entry) = self.cache.get_mut(key) {
            entry.dirty = true;
        }
    }

    /// Forget everything known about `key`.
    pub fn purge(&self, key: &str) {
        self.dags.remove(key);
        self.cache.remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.dags.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.dags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dags.is_empty()
    }
}
