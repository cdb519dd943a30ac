//! Bounded undo/redo history for one key

use std::collections::VecDeque;

use crate::cache::config::MementoPolicy;

/// Undo and redo stacks, each bounded by `MementoPolicy::max_depth`
#[derive(Debug)]
pub struct Memento<V> {
    undo: VecDeque<V>,
    redo: VecDeque<V>,
    max_depth: usize,
}

impl<V> Memento<V> {
    pub fn new(policy: MementoPolicy) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: VecDeque::new(),
            max_depth: policy.max_depth,
        }
    }

    fn push_bounded(stack: &mut VecDeque<V>, value: V, max_depth: usize) {
        if max_depth == 0 {
            return;
        }
        while stack.len() >= max_depth {
            stack.pop_front();
        }
        stack.push_back(value);
    }

    /// Record the value being overwritten; clears redo history
    pub fn record_write(&mut self, previous: V) {
        Self::push_bounded(&mut self.undo, previous, self.max_depth);
        self.redo.clear();
    }

    /// Step back: returns the value to restore, remembering `current` for redo
    pub fn undo(&mut self, current: V) -> Result<V, V> {
        match self.undo.pop_back() {
            Some(previous) => {
                Self::push_bounded(&mut self.redo, current, self.max_depth);
                Ok(previous)
            }
            None => Err(current),
        }
    }

    /// Step forward: returns the value to restore, remembering `current` for undo
    pub fn redo(&mut self, current: V) -> Result<V, V> {
        match self.redo.pop_back() {
            Some(next) => {
                Self::push_bounded(&mut self.undo, current, self.max_depth);
                Ok(next)
            }
            None => Err(current),
        }
    }

    #[inline]
    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    #[inline]
    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undo_redo_round_trip() {
        let mut memento = Memento::new(MementoPolicy::with_depth(5));
        // v1 -> v2 -> v3
        memento.record_write("v1");
        memento.record_write("v2");
        let mut current = "v3";

        current = memento.undo(current).unwrap_or(current);
        current = memento.undo(current).unwrap_or(current);
        assert_eq!(current, "v1");
        current = memento.redo(current).unwrap_or(current);
        assert_eq!(current, "v2");
        assert_eq!(memento.undo_depth(), 1);
        assert_eq!(memento.redo_depth(), 1);
    }

    #[test]
    fn test_depth_bound() {
        let mut memento = Memento::new(MementoPolicy::with_depth(2));
        for v in 0..10 {
            memento.record_write(v);
        }
        assert_eq!(memento.undo_depth(), 2);
        assert_eq!(memento.undo(10), Ok(9));
        assert_eq!(memento.undo(9), Ok(8));
        assert_eq!(memento.undo(8), Err(8));
        assert!(memento.redo_depth() <= 2);
    }

    #[test]
    fn test_write_clears_redo() {
        let mut memento = Memento::new(MementoPolicy::with_depth(3));
        memento.record_write(1);
        assert_eq!(memento.undo(2), Ok(1));
        assert_eq!(memento.redo_depth(), 1);
        memento.record_write(1);
        assert_eq!(memento.redo_depth(), 0);
    }

    #[test]
    fn test_disabled_history_keeps_nothing() {
        let mut memento = Memento::new(MementoPolicy::disabled());
        memento.record_write(1);
        assert_eq!(memento.undo(2), Err(2));
    }
}
