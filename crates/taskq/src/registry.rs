//! Insertion-ordered container that hands out a unique [`Handle`] per entry.
//!
//! Handles are minted from a monotonically increasing counter, so ordering
//! the entries by handle is the same as ordering them by insertion. Removing
//! an entry never renumbers the others.

use std::collections::BTreeMap;
use std::fmt;

/// Opaque identifier for one entry in a [`HandleRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Insertion-ordered map from [`Handle`] to value.
#[derive(Debug)]
pub struct HandleRegistry<T> {
    entries: BTreeMap<Handle, T>,
    next: u64,
}

impl<T> HandleRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next: 0,
        }
    }

    /// Insert `value` at the back and return its freshly minted handle.
    pub fn enqueue(&mut self, value: T) -> Handle {
        let handle = Handle(self.next);
        self.next += 1;
        self.entries.insert(handle, value);
        handle
    }

    /// Remove and return the earliest-inserted value.
    pub fn dequeue(&mut self) -> Option<T> {
        self.entries.pop_first().map(|(_, value)| value)
    }

    /// Earliest-inserted entry, without removing it.
    pub fn peek_first(&self) -> Option<(Handle, &T)> {
        self.entries.first_key_value().map(|(h, v)| (*h, v))
    }

    /// Remove and return the value stored under `handle`, if still present.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        self.entries.remove(&handle)
    }

    /// Remove the entry for `handle`. Returns whether anything was removed;
    /// unknown or already-removed handles are a no-op.
    pub fn delete(&mut self, handle: Handle) -> bool {
        self.remove(handle).is_some()
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.entries.get_mut(&handle)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Remove every entry. Handles already minted are never reused.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Remove every entry, yielding them in insertion order.
    pub fn drain(&mut self) -> impl Iterator<Item = (Handle, T)> {
        std::mem::take(&mut self.entries).into_iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
