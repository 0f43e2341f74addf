//! Hyperlinks extracted from message nodes.

use url::Url;

use super::content::ContentFamily;
use crate::domain::dom::{NodeId, NodeRef, WeakNode};

/// Processing state of a link candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// Extracted, not yet touched.
    #[default]
    Unprocessed,
    /// Anchor swapped for a loading placeholder.
    Placeholder,
    /// Replaced by a rendered embed.
    Resolved(ContentFamily),
    /// Replaced by a plain link to the original URL.
    Fallback,
}

impl LinkState {
    /// Returns true once the candidate reached a final state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved(_) | Self::Fallback)
    }
}

/// One hyperlink found in a message.
#[derive(Debug, Clone)]
pub struct LinkCandidate {
    url: Url,
    anchor_id: NodeId,
    anchor: WeakNode,
    message: WeakNode,
    state: LinkState,
}

impl LinkCandidate {
    /// Creates a candidate for `anchor` found inside `message`.
    #[must_use]
    pub fn new(url: Url, anchor: &NodeRef, message: &NodeRef) -> Self {
        Self {
            url,
            anchor_id: anchor.id(),
            anchor: std::sync::Arc::downgrade(anchor),
            message: std::sync::Arc::downgrade(message),
            state: LinkState::Unprocessed,
        }
    }

    /// The parsed `href`.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Id of the source anchor.
    #[must_use]
    pub const fn anchor_id(&self) -> NodeId {
        self.anchor_id
    }

    /// The anchor node, if the host has not dropped it.
    #[must_use]
    pub fn anchor(&self) -> Option<NodeRef> {
        self.anchor.upgrade()
    }

    /// The message the link was found in, if still alive.
    #[must_use]
    pub fn message(&self) -> Option<NodeRef> {
        self.message.upgrade()
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LinkState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: LinkState) {
        self.state = state;
    }
}
