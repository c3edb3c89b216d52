use std::time::Duration;

use shroud_doc::Document;
use tokio::time::Instant;

/// Last known state of one document.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    /// `None` records that the node had no document under this key.
    pub document: Option<Document>,
    pub refreshed_at: Instant,
    /// Deadline scheduled by a write; the entry is stale from then on.
    pub evict_at: Option<Instant>,
    pub dirty: bool,
}

impl CacheEntry {
    pub fn new(document: Option<Document>, refreshed_at: Instant) -> Self {
        Self {
            document,
            refreshed_at,
            evict_at: None,
            dirty: false,
        }
    }

    pub fn with_eviction(mut self, evict_at: Instant) -> Self {
        self.evict_at = Some(evict_at);
        self
    }

    /// Whether the entry may still be served without a fetch.
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        if self.dirty {
            return false;
        }
        if self.evict_at.is_some_and(|deadline| now >= deadline) {
            return false;
        }
        now.duration_since(self.refreshed_at) < ttl
    }
}
