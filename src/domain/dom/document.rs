//! The host document: node factory, root, and observer registry.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use super::mutation::{MutationKind, MutationObserver, MutationRecord, ObserveOptions, ObserverId};
use super::node::{Node, NodeId, NodeRef, WeakNode};
use super::selector::Selector;

struct Registration {
    id: ObserverId,
    target: WeakNode,
    options: ObserveOptions,
    sender: mpsc::UnboundedSender<MutationRecord>,
}

impl Registration {
    /// Observers also hear about their own target being detached, so they can
    /// tell their subtree went away.
    fn wants(&self, record: &MutationRecord) -> bool {
        let Some(target) = self.target.upgrade() else {
            return false;
        };
        if record.removes(target.id()) {
            return true;
        }

        let kind_wanted = match record.kind {
            MutationKind::ChildList => self.options.contains(ObserveOptions::CHILD_LIST),
            MutationKind::CharacterData => self.options.contains(ObserveOptions::CHARACTER_DATA),
        };
        if !kind_wanted {
            return false;
        }

        record.target.id() == target.id()
            || (self.options.contains(ObserveOptions::SUBTREE) && target.contains(&record.target))
    }
}

pub(crate) struct DocumentShared {
    root: NodeRef,
    body: NodeRef,
    next_node: AtomicU64,
    next_observer: AtomicU64,
    observers: Mutex<Vec<Registration>>,
}

impl DocumentShared {
    pub(super) fn root_id(&self) -> NodeId {
        self.root.id()
    }

    pub(super) fn dispatch(&self, record: &MutationRecord) {
        let mut observers = self.observers.lock();
        observers.retain(|registration| {
            if registration.sender.is_closed() || registration.target.strong_count() == 0 {
                return false;
            }
            if registration.wants(record) {
                trace!(target_node = %record.target.id(), "Queueing mutation record");
                return registration.sender.send(record.clone()).is_ok();
            }
            true
        });
    }

    pub(super) fn unregister(&self, id: ObserverId) {
        self.observers.lock().retain(|r| r.id != id);
    }
}

/// Handle to a host document. Cheap to clone; all clones share one tree.
#[derive(Clone)]
pub struct Document {
    shared: Arc<DocumentShared>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("root", &self.shared.root.id())
            .field("observers", &self.observer_count())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates an empty document with `html` and `body` elements.
    #[must_use]
    pub fn new() -> Self {
        let shared = Arc::new_cyclic(|weak| {
            let root = Node::new(NodeId(0), "html", weak.clone());
            let body = Node::new(NodeId(1), "body", weak.clone());
            DocumentShared {
                root,
                body,
                next_node: AtomicU64::new(2),
                next_observer: AtomicU64::new(1),
                observers: Mutex::new(Vec::new()),
            }
        });
        shared.root.append_child(shared.body.clone());
        Self { shared }
    }

    pub(super) const fn from_shared(shared: Arc<DocumentShared>) -> Self {
        Self { shared }
    }

    /// The `html` root element.
    #[must_use]
    pub fn root(&self) -> NodeRef {
        self.shared.root.clone()
    }

    /// The `body` element.
    #[must_use]
    pub fn body(&self) -> NodeRef {
        self.shared.body.clone()
    }

    /// Creates a detached element.
    #[must_use]
    pub fn create_element(&self, tag: &str) -> NodeRef {
        let id = NodeId(self.shared.next_node.fetch_add(1, Ordering::Relaxed));
        Node::new(id, tag, Arc::downgrade(&self.shared))
    }

    /// Starts building a detached element.
    #[must_use]
    pub fn element(&self, tag: &str) -> ElementBuilder {
        ElementBuilder {
            node: self.create_element(tag),
        }
    }

    /// First element in the document matching `selector`.
    #[must_use]
    pub fn query_selector(&self, selector: &Selector) -> Option<NodeRef> {
        if selector.matches(&self.shared.root) {
            return Some(self.root());
        }
        self.shared.root.query_selector(selector)
    }

    /// Returns true if `node` belongs to this document and is connected.
    #[must_use]
    pub fn contains(&self, node: &Node) -> bool {
        node.owner_document()
            .is_some_and(|doc| Arc::ptr_eq(&doc.shared, &self.shared))
            && node.is_connected()
    }

    /// Starts observing `node`.
    #[must_use]
    pub fn observe(&self, node: &NodeRef, options: ObserveOptions) -> MutationObserver {
        let id = ObserverId(self.shared.next_observer.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::unbounded_channel();
        self.shared.observers.lock().push(Registration {
            id,
            target: Arc::downgrade(node),
            options,
            sender,
        });
        MutationObserver::new(id, node.id(), receiver, Arc::downgrade(&self.shared))
    }

    /// Number of live observer registrations.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.shared
            .observers
            .lock()
            .iter()
            .filter(|r| !r.sender.is_closed())
            .count()
    }
}

/// Fluent construction of detached elements.
#[must_use]
pub struct ElementBuilder {
    node: NodeRef,
}

impl ElementBuilder {
    /// Adds a class.
    pub fn class(self, class: &str) -> Self {
        self.node.add_class(class);
        self
    }

    /// Sets an attribute.
    pub fn attr(self, name: &str, value: impl Into<String>) -> Self {
        self.node.set_attribute(name, value);
        self
    }

    /// Sets the element's own text. No record is emitted while detached and unobserved.
    pub fn text(self, text: impl Into<String>) -> Self {
        self.node.set_text(text);
        self
    }

    /// Appends a child.
    pub fn child(self, child: NodeRef) -> Self {
        self.node.append_child(child);
        self
    }

    /// Finishes the element, still detached.
    pub fn build(self) -> NodeRef {
        self.node
    }
}
