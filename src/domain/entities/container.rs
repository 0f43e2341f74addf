//! The live feed container.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::dom::{NodeId, NodeRef, WeakNode};

/// Element hosting the chat messages, held weakly so the host can drop it.
#[derive(Debug, Clone)]
pub struct FeedContainer {
    id: NodeId,
    node: WeakNode,
    selector: String,
    discovered_at: DateTime<Utc>,
}

impl FeedContainer {
    /// Wraps `node`, found through `selector`.
    #[must_use]
    pub fn new(node: &NodeRef, selector: impl Into<String>) -> Self {
        Self {
            id: node.id(),
            node: Arc::downgrade(node),
            selector: selector.into(),
            discovered_at: Utc::now(),
        }
    }

    /// Id of the container node.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Selector that matched the container.
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// When the container was found.
    #[must_use]
    pub const fn discovered_at(&self) -> DateTime<Utc> {
        self.discovered_at
    }

    /// The container node, only while it is still connected to the document.
    #[must_use]
    pub fn node(&self) -> Option<NodeRef> {
        self.node.upgrade().filter(|node| node.is_connected())
    }

    /// Liveness check used before every use.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.node().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dom::Document;

    #[test]
    fn test_container_liveness_follows_document() {
        let doc = Document::new();
        let list = doc.element("div").class("chat-list").build();
        doc.body().append_child(list.clone());

        let container = FeedContainer::new(&list, ".chat-list");
        assert!(container.is_alive());

        list.remove();
        assert!(!container.is_alive());

        doc.body().append_child(list.clone());
        assert!(container.is_alive());

        list.remove();
        drop(list);
        assert!(container.node().is_none());
    }
}
