//! Semantic cache for gatekeeper decisions.
//!
//! Repeated utterances ("요금제 변경해줘") hit the same classification
//! every time; caching the decision saves a fast-LLM round trip. Keys
//! are aggressively normalized to raise the hit rate, and the whole
//! touch+get runs under one lock so LRU order stays correct under
//! concurrent turns.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;

pub struct SemanticCache {
    entries: Mutex<LruCache<String, Value>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SemanticCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Lowercase and strip everything but word characters, so spacing
    /// and punctuation variants of the same utterance share a key.
    fn normalize_key(text: &str) -> String {
        text.chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .flat_map(char::to_lowercase)
            .collect()
    }

    /// Look up a prior decision. A hit refreshes the entry's LRU slot.
    pub fn get(&self, text: &str) -> Option<Value> {
        let key = Self::normalize_key(text);
        let mut entries = self.entries.lock();
        match entries.get(&key) {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %key, "cache hit");
                Some(value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn set(&self, text: &str, value: Value) {
        let key = Self::normalize_key(text);
        self.entries.lock().put(key, value);
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
