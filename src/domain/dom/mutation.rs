//! Mutation records and observers.

use std::sync::Weak;

use bitflags::bitflags;
use tokio::sync::mpsc;

use super::document::DocumentShared;
use super::node::{NodeId, NodeRef};

bitflags! {
    /// What an observer wants to hear about.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ObserveOptions: u8 {
        /// Children added to or removed from the observed node.
        const CHILD_LIST = 1 << 0;
        /// Extend `CHILD_LIST`/`CHARACTER_DATA` to the whole subtree.
        const SUBTREE = 1 << 1;
        /// Text changes.
        const CHARACTER_DATA = 1 << 2;
    }
}

/// Kind of change a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Children were added or removed.
    ChildList,
    /// A node's own text changed.
    CharacterData,
}

/// One change to the document.
#[derive(Debug, Clone)]
pub struct MutationRecord {
    /// Kind of change.
    pub kind: MutationKind,
    /// Node whose children or text changed.
    pub target: NodeRef,
    /// Nodes inserted under `target`.
    pub added: Vec<NodeRef>,
    /// Nodes removed from `target`.
    pub removed: Vec<NodeRef>,
}

impl MutationRecord {
    pub(super) fn child_list(
        target: NodeRef,
        added: Vec<NodeRef>,
        removed: Vec<NodeRef>,
    ) -> Self {
        Self {
            kind: MutationKind::ChildList,
            target,
            added,
            removed,
        }
    }

    pub(super) fn character_data(target: NodeRef) -> Self {
        Self {
            kind: MutationKind::CharacterData,
            target,
            added: Vec::new(),
            removed: Vec::new(),
        }
    }

    /// Returns true if the node with `id` is among the removed nodes.
    #[must_use]
    pub fn removes(&self, id: NodeId) -> bool {
        self.removed.iter().any(|n| n.id() == id)
    }
}

/// Identifier of an observer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(super) u64);

/// Receives mutation records for one observed node.
///
/// Records are queued as they happen and handed out in batches: everything
/// queued by the time the first record is received forms one batch. Dropping
/// the observer disconnects it.
pub struct MutationObserver {
    id: ObserverId,
    target: NodeId,
    receiver: mpsc::UnboundedReceiver<MutationRecord>,
    document: Weak<DocumentShared>,
}

impl std::fmt::Debug for MutationObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationObserver")
            .field("id", &self.id)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl MutationObserver {
    pub(super) fn new(
        id: ObserverId,
        target: NodeId,
        receiver: mpsc::UnboundedReceiver<MutationRecord>,
        document: Weak<DocumentShared>,
    ) -> Self {
        Self {
            id,
            target,
            receiver,
            document,
        }
    }

    /// Id of the observed node.
    #[must_use]
    pub const fn target(&self) -> NodeId {
        self.target
    }

    /// Waits for the next batch. Returns `None` once the document is gone.
    pub async fn next_batch(&mut self) -> Option<Vec<MutationRecord>> {
        let first = self.receiver.recv().await?;
        let mut batch = vec![first];
        batch.extend(self.take_records());
        Some(batch)
    }

    /// Drains queued records without waiting.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        let mut records = Vec::new();
        while let Ok(record) = self.receiver.try_recv() {
            records.push(record);
        }
        records
    }

    /// Stops observing.
    pub fn disconnect(self) {}
}

impl Drop for MutationObserver {
    fn drop(&mut self) {
        if let Some(document) = self.document.upgrade() {
            document.unregister(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dom::Document;

    #[tokio::test]
    async fn test_subtree_batches() {
        let doc = Document::new();
        let list = doc.create_element("div");
        doc.body().append_child(list.clone());
        let mut observer = doc.observe(
            &list,
            ObserveOptions::CHILD_LIST | ObserveOptions::SUBTREE,
        );

        let message = doc.create_element("div");
        list.append_child(message.clone());
        message.append_child(doc.create_element("a"));

        let batch = observer.next_batch().await.expect("batch");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].added[0].id(), message.id());
        assert_eq!(batch[1].target.id(), message.id());
    }

    #[tokio::test]
    async fn test_non_subtree_ignores_grandchildren() {
        let doc = Document::new();
        let list = doc.create_element("div");
        let message = doc.create_element("div");
        list.append_child(message.clone());
        let mut observer = doc.observe(&list, ObserveOptions::CHILD_LIST);

        message.append_child(doc.create_element("a"));
        assert!(observer.take_records().is_empty());
    }

    #[tokio::test]
    async fn test_character_data_requires_opt_in() {
        let doc = Document::new();
        let list = doc.create_element("div");
        let mut observer = doc.observe(
            &list,
            ObserveOptions::CHILD_LIST | ObserveOptions::SUBTREE,
        );

        list.set_text("hello");
        assert!(observer.take_records().is_empty());
    }

    #[tokio::test]
    async fn test_observer_hears_own_removal() {
        let doc = Document::new();
        let list = doc.create_element("div");
        doc.body().append_child(list.clone());
        let mut observer = doc.observe(
            &list,
            ObserveOptions::CHILD_LIST | ObserveOptions::SUBTREE,
        );

        list.remove();

        let records = observer.take_records();
        assert_eq!(records.len(), 1);
        assert!(records[0].removes(list.id()));
    }

    #[test]
    fn test_drop_disconnects() {
        let doc = Document::new();
        let list = doc.create_element("div");
        let observer = doc.observe(&list, ObserveOptions::CHILD_LIST);
        assert_eq!(doc.observer_count(), 1);

        observer.disconnect();
        assert_eq!(doc.observer_count(), 0);
    }
}
