//! In-process model of the host document the embedder works against.

mod document;
mod mutation;
mod node;
mod selector;

pub use document::{Document, ElementBuilder};
pub use mutation::{MutationKind, MutationObserver, MutationRecord, ObserveOptions, ObserverId};
pub use node::{Node, NodeId, NodeRef, WeakNode};
pub use selector::{Selector, SelectorError};
