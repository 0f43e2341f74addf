//! Side table of nodes that have already been handled.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::dom::{Node, NodeId, NodeRef, WeakNode};

/// Table size below which dead entries are never pruned.
const MIN_PRUNE_AT: usize = 64;

#[derive(Debug)]
struct Entries {
    nodes: HashMap<NodeId, WeakNode>,
    prune_at: usize,
}

impl Default for Entries {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
            prune_at: MIN_PRUNE_AT,
        }
    }
}

impl Entries {
    /// Drops dead entries once the table has doubled since the last pass.
    fn maybe_prune(&mut self) {
        if self.nodes.len() < self.prune_at {
            return;
        }
        self.nodes.retain(|_, weak| weak.strong_count() > 0);
        self.prune_at = (self.nodes.len() * 2).max(MIN_PRUNE_AT);
    }
}

/// Set of marked nodes keyed by id, holding only weak references.
///
/// Entries whose node has been dropped are pruned whenever the table doubles,
/// so nodes removed by the host are forgotten without explicit cleanup.
#[derive(Debug, Default)]
pub struct NodeMarks {
    entries: Mutex<Entries>,
}

impl NodeMarks {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `node`. Returns false if it was already marked.
    ///
    /// Check and insert happen under one lock acquisition.
    pub fn mark(&self, node: &NodeRef) -> bool {
        let mut entries = self.entries.lock();
        if entries
            .nodes
            .get(&node.id())
            .is_some_and(|weak| weak.strong_count() > 0)
        {
            return false;
        }
        entries.maybe_prune();
        entries.nodes.insert(node.id(), Arc::downgrade(node));
        true
    }

    /// Returns true if `node` is marked and alive.
    #[must_use]
    pub fn is_marked(&self, node: &Node) -> bool {
        self.entries
            .lock()
            .nodes
            .get(&node.id())
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Removes the mark on `node`, if any.
    pub fn unmark(&self, node: &Node) -> bool {
        self.entries.lock().nodes.remove(&node.id()).is_some()
    }

    /// Number of marks whose node is still alive.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .nodes
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Returns true if no live node is marked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every mark.
    pub fn clear(&self) {
        *self.entries.lock() = Entries::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dom::Document;

    #[test]
    fn test_mark_is_idempotent() {
        let doc = Document::new();
        let node = doc.create_element("div");
        let marks = NodeMarks::new();

        assert!(marks.mark(&node));
        assert!(!marks.mark(&node));
        assert!(marks.is_marked(&node));
        assert_eq!(marks.len(), 1);
    }

    #[test]
    fn test_dropped_nodes_are_forgotten() {
        let doc = Document::new();
        let marks = NodeMarks::new();
        let gone = doc.create_element("div");
        marks.mark(&gone);
        drop(gone);

        assert!(marks.is_empty());
        let other = doc.create_element("div");
        assert!(marks.mark(&other));
    }

    #[test]
    fn test_dead_entries_are_pruned_when_table_doubles() {
        let doc = Document::new();
        let marks = NodeMarks::new();
        for _ in 0..MIN_PRUNE_AT {
            marks.mark(&doc.create_element("div"));
        }
        assert_eq!(marks.entries.lock().nodes.len(), MIN_PRUNE_AT);

        let kept = doc.create_element("div");
        marks.mark(&kept);

        let entries = marks.entries.lock();
        assert_eq!(entries.nodes.len(), 1);
        assert_eq!(entries.prune_at, MIN_PRUNE_AT);
    }

    #[test]
    fn test_live_entries_push_the_next_prune_out() {
        let doc = Document::new();
        let marks = NodeMarks::new();
        let live: Vec<_> = (0..=MIN_PRUNE_AT).map(|_| doc.create_element("a")).collect();
        for node in &live {
            marks.mark(node);
        }

        assert_eq!(marks.len(), MIN_PRUNE_AT + 1);
        assert_eq!(marks.entries.lock().prune_at, MIN_PRUNE_AT * 2);
    }

    #[test]
    fn test_unmark_allows_remarking() {
        let doc = Document::new();
        let node = doc.create_element("a");
        let marks = NodeMarks::new();

        marks.mark(&node);
        assert!(marks.unmark(&node));
        assert!(marks.mark(&node));
    }
}
