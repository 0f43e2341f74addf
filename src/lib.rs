//! Oxiembed - turns links in a live chat feed into rich embeds.
//!
//! The crate watches an in-process model of a chat page, finds new messages
//! as they arrive, classifies their links, fetches metadata through a shared
//! request cache, and swaps each link for a rendered embed or a plain link.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the embedding services.
pub mod application;
/// Domain layer containing the document model, entities, errors, and ports.
pub mod domain;
/// Infrastructure layer containing configuration, HTTP and resolvers.
pub mod infrastructure;
/// Presentation layer containing the renderer and the console host.
pub mod presentation;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "oxiembed";
