//! Concurrency primitives shared across the engine.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A concurrent set that owns an atomic cardinality mirror.
///
/// Hot paths (the per-effect scaling hook) need a "is anything tracked at
/// all?" check that never takes a lock. `CountedSet` keeps the size mirror
/// inside the same type as the set, so every insert and remove updates both
/// under the write lock and the two can never drift apart.
///
/// `len_hint` is monotone-consistent, not linearizable: it may briefly lag a
/// concurrent mutation, which is fine for a fast-reject check.
#[derive(Debug, Default)]
pub struct CountedSet<T> {
    inner: RwLock<HashSet<T>>,
    size: AtomicUsize,
}

impl<T: Eq + Hash + Clone> CountedSet<T> {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashSet::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Insert a value. Returns `true` if it was not already present.
    pub fn insert(&self, value: T) -> bool {
        let mut guard = self.inner.write();
        let added = guard.insert(value);
        if added {
            self.size.store(guard.len(), Ordering::Release);
        }
        added
    }

    /// Remove a value. Returns `true` if it was present.
    pub fn remove(&self, value: &T) -> bool {
        let mut guard = self.inner.write();
        let removed = guard.remove(value);
        if removed {
            self.size.store(guard.len(), Ordering::Release);
        }
        removed
    }

    /// Whether the value is present. Takes the read lock.
    pub fn contains(&self, value: &T) -> bool {
        self.inner.read().contains(value)
    }

    /// Lock-free size hint for fast-reject checks.
    #[must_use]
    pub fn len_hint(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    /// Lock-free emptiness hint.
    #[must_use]
    pub fn is_empty_hint(&self) -> bool {
        self.len_hint() == 0
    }

    /// Remove everything.
    pub fn clear(&self) {
        let mut guard = self.inner.write();
        guard.clear();
        self.size.store(0, Ordering::Release);
    }

    /// Replace the whole contents in one step (load path).
    pub fn replace(&self, values: HashSet<T>) {
        let mut guard = self.inner.write();
        self.size.store(values.len(), Ordering::Release);
        *guard = values;
    }

    /// Clone the current contents.
    #[must_use]
    pub fn snapshot(&self) -> HashSet<T> {
        self.inner.read().clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
