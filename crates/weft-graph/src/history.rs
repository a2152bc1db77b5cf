use std::collections::VecDeque;

use tracing::debug;

use crate::snapshot::GraphSnapshot;

/// Bounded undo/redo stacks of graph snapshots.
///
/// The manager never looks at the graph itself: callers hand it the snapshot
/// taken *before* a committed mutation, and on undo/redo the snapshot of the
/// *current* state to park on the opposite stack.
#[derive(Debug)]
pub struct HistoryManager {
    undo: VecDeque<GraphSnapshot>,
    redo: Vec<GraphSnapshot>,
    capacity: usize,
}

impl HistoryManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: VecDeque::with_capacity(capacity.min(64)),
            redo: Vec::new(),
            capacity,
        }
    }

    /// Record the pre-mutation state of a committed change.
    pub fn record(&mut self, before: GraphSnapshot) {
        if self.capacity == 0 {
            return;
        }
        self.undo.push_back(before);
        self.redo.clear();
        while self.undo.len() > self.capacity {
            self.undo.pop_front();
        }
        debug!(undo_depth = self.undo.len(), "History recorded");
    }

    /// Step back. Returns the snapshot to restore, or `None` when there is
    /// nothing to undo.
    pub fn undo(&mut self, current: GraphSnapshot) -> Option<GraphSnapshot> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current);
        Some(previous)
    }

    /// Step forward after an undo.
    pub fn redo(&mut self, current: GraphSnapshot) -> Option<GraphSnapshot> {
        let next = self.redo.pop()?;
        self.undo.push_back(current);
        while self.undo.len() > self.capacity {
            self.undo.pop_front();
        }
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use std::sync::Arc;
    use weft_core::types::Viewport;

    fn snap(n: usize) -> GraphSnapshot {
        let nodes = (0..n).map(|i| Node::new(format!("n{}", i), "agent")).collect();
        GraphSnapshot::new(Arc::new(nodes), Arc::new(vec![]), Viewport::default())
    }

    #[test]
    fn test_empty_stacks_are_noops() {
        let mut history = HistoryManager::new(5);
        assert!(history.undo(snap(0)).is_none());
        assert!(history.redo(snap(0)).is_none());
        assert_eq!(history.redo_depth(), 0);
    }

    #[test]
    fn test_undo_redo_swap() {
        let mut history = HistoryManager::new(5);
        history.record(snap(0));
        let restored = history.undo(snap(1)).unwrap();
        assert_eq!(restored.nodes.len(), 0);
        assert!(history.can_redo());

        let forward = history.redo(restored).unwrap();
        assert_eq!(forward.nodes.len(), 1);
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_record_clears_redo() {
        let mut history = HistoryManager::new(5);
        history.record(snap(0));
        history.undo(snap(1));
        assert!(history.can_redo());
        history.record(snap(0));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = HistoryManager::new(50);
        for i in 0..51 {
            history.record(snap(i));
        }
        assert_eq!(history.undo_depth(), 50);

        let mut current = snap(51);
        let mut oldest = None;
        while let Some(prev) = history.undo(current.clone()) {
            current = prev.clone();
            oldest = Some(prev);
        }
        // The pre-state of the very first mutation was evicted.
        assert_eq!(oldest.unwrap().nodes.len(), 1);
    }

    #[test]
    fn test_zero_capacity_never_records() {
        let mut history = HistoryManager::new(0);
        history.record(snap(0));
        assert!(!history.can_undo());
    }
}
