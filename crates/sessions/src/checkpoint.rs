//! Per-call pipeline checkpoints.
//!
//! Each agent pipeline persists its node state between turns under the
//! call id. The map is in-memory; the narrow surface (get / update /
//! remove) is what would become a storage trait if durability were ever
//! needed.

use std::collections::HashMap;

use parking_lot::RwLock;

pub struct Checkpoints<S> {
    states: RwLock<HashMap<String, S>>,
}

impl<S: Clone + Default> Checkpoints<S> {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Snapshot the state for `call_id`, default when none exists yet.
    pub fn get_or_default(&self, call_id: &str) -> S {
        self.states.read().get(call_id).cloned().unwrap_or_default()
    }

    /// Mutate the state for `call_id` in place, creating it on first use.
    /// Mutation happens under the write lock; callers keep the closure
    /// small and non-blocking.
    pub fn update<R>(&self, call_id: &str, f: impl FnOnce(&mut S) -> R) -> R {
        let mut states = self.states.write();
        f(states.entry(call_id.to_owned()).or_default())
    }

    pub fn remove(&self, call_id: &str) {
        self.states.write().remove(call_id);
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}

impl<S: Clone + Default> Default for Checkpoints<S> {
    fn default() -> Self {
        Self::new()
    }
}
