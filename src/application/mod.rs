//! Application layer: the embedding pipeline and its fetch layer.

/// Services driving containers, links and embeds.
pub mod services;
