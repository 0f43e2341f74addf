//! Errors raised while committing rendered content to the document.

use thiserror::Error;

use crate::domain::dom::NodeId;

/// Commit failures. All of them are absorbed by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum EmbedError {
    #[error("node {node} left the document before it could be replaced")]
    StaleTarget { node: NodeId },
}
