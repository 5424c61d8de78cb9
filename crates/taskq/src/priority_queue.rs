//! Fixed set of [`HandleRegistry`] levels drained strictly in level order.
//!
//! Level 0 is always drained before level 1, level 1 before level 2, and so
//! on, re-evaluated at every dequeue. A sustained stream of level-0 work
//! therefore starves the lower levels; that is the intended strict-priority
//! behavior, not a fairness bug.

use crate::error::{Result, TaskqError};
use crate::registry::{Handle, HandleRegistry};

#[derive(Debug)]
pub struct PriorityQueue<T> {
    levels: Vec<HandleRegistry<T>>,
}

impl<T> PriorityQueue<T> {
    /// Create a queue with `levels` priority levels (`0..levels`).
    pub fn new(levels: usize) -> Result<Self> {
        if levels == 0 {
            return Err(TaskqError::InvalidConfig(
                "priority queue needs at least one level".to_string(),
            ));
        }
        Ok(Self {
            levels: (0..levels).map(|_| HandleRegistry::new()).collect(),
        })
    }

    /// Highest valid level index.
    pub fn max_index(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    fn check(&self, level: usize) -> Result<()> {
        if level > self.max_index() {
            return Err(TaskqError::OutOfRange {
                level: level as i64,
                max: self.max_index(),
            });
        }
        Ok(())
    }

    /// Insert `value` at `level`.
    pub fn enqueue(&mut self, value: T, level: usize) -> Result<Handle> {
        self.check(level)?;
        Ok(self.levels[level].enqueue(value))
    }

    /// Remove and return the earliest entry of the highest non-empty level.
    pub fn dequeue(&mut self) -> Option<T> {
        self.levels.iter_mut().find_map(HandleRegistry::dequeue)
    }

    /// Earliest entry of the highest non-empty level, with its level index.
    pub fn peek(&self) -> Option<(usize, Handle, &T)> {
        self.levels
            .iter()
            .enumerate()
            .find_map(|(level, reg)| reg.peek_first().map(|(h, v)| (level, h, v)))
    }

    /// Direct access to one level's registry.
    pub fn level(&self, level: usize) -> Result<&HandleRegistry<T>> {
        self.check(level)?;
        Ok(&self.levels[level])
    }

    /// Mutable access to one level's registry, used for level-scoped runs.
    pub fn level_mut(&mut self, level: usize) -> Result<&mut HandleRegistry<T>> {
        self.check(level)?;
        Ok(&mut self.levels[level])
    }

    /// Remove the entry `handle` from `level`. Returns whether anything was removed.
    pub fn delete(&mut self, handle: Handle, level: usize) -> Result<bool> {
        self.check(level)?;
        Ok(self.levels[level].delete(handle))
    }

    /// Total number of entries across all levels.
    pub fn len(&self) -> usize {
        self.levels.iter().map(HandleRegistry::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(HandleRegistry::is_empty)
    }

    /// Empty every level. The number of levels never changes.
    pub fn clear(&mut self) {
        self.levels.iter_mut().for_each(HandleRegistry::clear);
    }
}
