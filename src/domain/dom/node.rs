//! Element nodes of the host document.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::document::{Document, DocumentShared};
use super::mutation::MutationRecord;
use super::selector::Selector;

/// Shared handle to a node.
pub type NodeRef = Arc<Node>;

/// Non-owning handle to a node.
pub type WeakNode = Weak<Node>;

/// Document-unique node identifier. Never reused within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(super) u64);

impl NodeId {
    /// Returns the underlying value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Default)]
struct TreeLinks {
    parent: Option<WeakNode>,
    children: Vec<NodeRef>,
}

/// An element in the host document.
///
/// Tree edits go through `&Arc<Node>` receivers so that mutation records can
/// carry strong references to the nodes involved.
pub struct Node {
    id: NodeId,
    tag: String,
    attributes: RwLock<BTreeMap<String, String>>,
    text: RwLock<String>,
    links: RwLock<TreeLinks>,
    document: Weak<DocumentShared>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("attributes", &*self.attributes.read())
            .finish_non_exhaustive()
    }
}

impl Node {
    pub(super) fn new(id: NodeId, tag: &str, document: Weak<DocumentShared>) -> NodeRef {
        Arc::new(Self {
            id,
            tag: tag.to_ascii_lowercase(),
            attributes: RwLock::new(BTreeMap::new()),
            text: RwLock::new(String::new()),
            links: RwLock::new(TreeLinks::default()),
            document,
        })
    }

    /// Returns the node id.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the lowercase tag name.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the document this node was created by, if it still exists.
    #[must_use]
    pub fn owner_document(&self) -> Option<Document> {
        self.document.upgrade().map(Document::from_shared)
    }

    /// Value of attribute `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.read().get(name).cloned()
    }

    /// Returns true if attribute `name` is set.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.read().contains_key(name)
    }

    /// Sets attribute `name`, replacing any previous value.
    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.write().insert(name.into(), value.into());
    }

    /// Removes attribute `name`, returning its old value.
    pub fn remove_attribute(&self, name: &str) -> Option<String> {
        self.attributes.write().remove(name)
    }

    /// Returns true if the whitespace-separated `class` attribute contains `class`.
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.attributes
            .read()
            .get("class")
            .is_some_and(|value| value.split_whitespace().any(|c| c == class))
    }

    /// Adds `class` unless present.
    pub fn add_class(&self, class: &str) {
        let mut attributes = self.attributes.write();
        let entry = attributes.entry("class".to_string()).or_default();
        if !entry.split_whitespace().any(|c| c == class) {
            if !entry.is_empty() {
                entry.push(' ');
            }
            entry.push_str(class);
        }
    }

    /// Returns this node's own text, excluding children.
    #[must_use]
    pub fn text(&self) -> String {
        self.text.read().clone()
    }

    /// Replaces this node's own text and reports a character-data mutation.
    pub fn set_text(self: &Arc<Self>, text: impl Into<String>) {
        *self.text.write() = text.into();
        self.notify(MutationRecord::character_data(self.clone()));
    }

    /// Concatenated text of this node and all descendants, in document order.
    #[must_use]
    pub fn text_content(&self) -> String {
        let mut out = self.text();
        for child in self.children() {
            out.push_str(&child.text_content());
        }
        out
    }

    /// Parent element, if attached.
    #[must_use]
    pub fn parent(&self) -> Option<NodeRef> {
        self.links.read().parent.as_ref().and_then(Weak::upgrade)
    }

    /// Snapshot of the children.
    #[must_use]
    pub fn children(&self) -> Vec<NodeRef> {
        self.links.read().children.clone()
    }

    /// First child, if any.
    #[must_use]
    pub fn first_child(&self) -> Option<NodeRef> {
        self.links.read().children.first().cloned()
    }

    /// Returns true when the node is reachable from its document's root.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        let Some(document) = self.document.upgrade() else {
            return false;
        };
        let root_id = document.root_id();
        if self.id == root_id {
            return true;
        }

        let mut current = self.parent();
        while let Some(node) = current {
            if node.id == root_id {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Inclusive containment check: true if `other` is this node or one of its descendants.
    #[must_use]
    pub fn contains(&self, other: &Node) -> bool {
        if other.id == self.id {
            return true;
        }
        let mut current = other.parent();
        while let Some(node) = current {
            if node.id == self.id {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// All descendants in pre-order, excluding the node itself.
    #[must_use]
    pub fn descendants(&self) -> Vec<NodeRef> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeRef> = self.children().into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            stack.extend(node.children().into_iter().rev());
            out.push(node);
        }
        out
    }

    /// Returns true if this node matches `selector`.
    #[must_use]
    pub fn matches(&self, selector: &Selector) -> bool {
        selector.matches(self)
    }

    /// First descendant matching `selector`, in document order.
    #[must_use]
    pub fn query_selector(&self, selector: &Selector) -> Option<NodeRef> {
        self.descendants().into_iter().find(|n| selector.matches(n))
    }

    /// All descendants matching `selector`, in document order.
    #[must_use]
    pub fn query_selector_all(&self, selector: &Selector) -> Vec<NodeRef> {
        self.descendants()
            .into_iter()
            .filter(|n| selector.matches(n))
            .collect()
    }

    /// Appends `child`, moving it out of its previous parent first.
    pub fn append_child(self: &Arc<Self>, child: NodeRef) -> bool {
        self.insert_before(child, None)
    }

    /// Inserts `child` before `reference`, or at the end when `reference` is `None`.
    ///
    /// Returns false when the edit would create a cycle or `reference` is not a child.
    pub fn insert_before(self: &Arc<Self>, child: NodeRef, reference: Option<&NodeRef>) -> bool {
        if child.contains(self) {
            return false;
        }
        if let Some(reference) = reference
            && reference.parent().is_none_or(|p| p.id != self.id)
        {
            return false;
        }

        detach(&child);

        {
            let mut links = self.links.write();
            let index = reference
                .and_then(|r| links.children.iter().position(|c| c.id == r.id))
                .unwrap_or(links.children.len());
            links.children.insert(index, child.clone());
        }
        child.links.write().parent = Some(Arc::downgrade(self));

        self.notify(MutationRecord::child_list(
            self.clone(),
            vec![child],
            Vec::new(),
        ));
        true
    }

    /// Removes `child` from this node. Returns false if it was not a child.
    pub fn remove_child(self: &Arc<Self>, child: &NodeRef) -> bool {
        if child.parent().is_none_or(|p| p.id != self.id) {
            return false;
        }
        detach(child).is_some()
    }

    /// Removes this node from its parent.
    pub fn remove(self: &Arc<Self>) -> bool {
        detach(self).is_some()
    }

    /// Puts `replacement` at this node's position and detaches this node.
    ///
    /// Returns false when this node has no parent, so nothing is ever inserted
    /// into a detached location.
    pub fn replace_with(self: &Arc<Self>, replacement: NodeRef) -> bool {
        if replacement.id == self.id {
            return self.parent().is_some();
        }
        let Some(parent) = self.parent() else {
            return false;
        };
        if replacement.contains(&parent) {
            return false;
        }

        detach(&replacement);

        {
            let mut links = parent.links.write();
            let Some(index) = links.children.iter().position(|c| c.id == self.id) else {
                return false;
            };
            links.children[index] = replacement.clone();
        }
        self.links.write().parent = None;
        replacement.links.write().parent = Some(Arc::downgrade(&parent));

        parent.notify(MutationRecord::child_list(
            parent.clone(),
            vec![replacement],
            vec![self.clone()],
        ));
        true
    }

    fn notify(&self, record: MutationRecord) {
        if let Some(document) = self.document.upgrade() {
            document.dispatch(&record);
        }
    }
}

/// Unlinks `node` from its parent, reporting the removal. Returns the old parent.
fn detach(node: &NodeRef) -> Option<NodeRef> {
    let parent = node.parent()?;
    {
        let mut links = parent.links.write();
        let index = links.children.iter().position(|c| c.id == node.id)?;
        links.children.remove(index);
    }
    node.links.write().parent = None;
    parent.notify(MutationRecord::child_list(
        parent.clone(),
        Vec::new(),
        vec![node.clone()],
    ));
    Some(parent)
}
