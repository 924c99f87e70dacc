//! Last-known-good stage outputs for the `cached_response` strategy.

use crate::provider::ProviderResponse;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CachedEntry {
    response: ProviderResponse,
    stored_at: Instant,
}

/// Stage names kept before the oldest entry is evicted.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Most recent successful response per stage name, bounded by capacity.
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<String, CachedEntry>,
    capacity: usize,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn store(&self, stage: &str, response: &ProviderResponse) {
        if !self.entries.contains_key(stage) {
            while self.entries.len() >= self.capacity {
                if !self.evict_oldest() {
                    break;
                }
            }
        }
        self.entries.insert(
            stage.to_string(),
            CachedEntry {
                response: response.clone(),
                stored_at: Instant::now(),
            },
        );
    }

    /// Cached response for `stage` if younger than `max_age`.
    pub fn get(&self, stage: &str, max_age: Duration) -> Option<ProviderResponse> {
        let entry = self.entries.get(stage)?;
        if entry.stored_at.elapsed() <= max_age {
            Some(entry.response.clone())
        } else {
            None
        }
    }

    fn evict_oldest(&self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.stored_at)
            .map(|entry| entry.key().clone());
        match oldest {
            Some(stage) => {
                self.entries.remove(&stage);
                tracing::debug!(stage = %stage, "Evicted cached response");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
