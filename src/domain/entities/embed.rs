//! Records of rendered embeds.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use url::Url;

use super::content::ContentFamily;
use crate::domain::dom::{NodeRef, WeakNode};

/// A rendered replacement for a resolved link.
#[derive(Debug, Clone)]
pub struct EmbedRecord {
    /// URL the embed was resolved from.
    pub url: Url,
    /// Family that produced it.
    pub family: ContentFamily,
    node: WeakNode,
    /// When the embed was committed.
    pub created_at: DateTime<Utc>,
}

impl EmbedRecord {
    /// Records `node` as the embed of `url`.
    #[must_use]
    pub fn new(url: Url, family: ContentFamily, node: &NodeRef) -> Self {
        Self {
            url,
            family,
            node: Arc::downgrade(node),
            created_at: Utc::now(),
        }
    }

    /// The rendered node while it is still in the document.
    #[must_use]
    pub fn live_node(&self) -> Option<NodeRef> {
        self.node.upgrade().filter(|node| node.is_connected())
    }
}
