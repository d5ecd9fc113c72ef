//! Capturing a path-prefix window for later inspection or undo
//!
//! A [`Recording`] remembers how long the store's committed path was when
//! it was created. Later, [`Recording::commits`] returns every delta
//! committed since, and [`Recording::rollback`] unwinds the store back to
//! that point (spec.md §3).

use crate::delta::Delta;
use crate::facts::FactStore;

/// A marker capturing a store's path length at creation time.
pub struct Recording<'a> {
    store: &'a FactStore,
    start: usize,
}

impl<'a> Recording<'a> {
    pub(crate) fn new(store: &'a FactStore) -> Self {
        let start = store.path_len();
        Recording { store, start }
    }

    /// Every delta committed since this recording started, oldest first.
    /// If `rollback` is true, the store is rewound to the start of the
    /// recording afterwards.
    pub fn commits(&self, rollback: bool) -> Vec<Delta> {
        let deltas = self.store.path_slice(self.start);
        if rollback {
            self.rollback();
        }
        deltas
    }

    /// Rewinds the store to the point this recording started.
    pub fn rollback(&self) {
        let current = self.store.path_len() as i64;
        let target = self.start as i64;
        self.store.rollback(target - current);
    }
}
