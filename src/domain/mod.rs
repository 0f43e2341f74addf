//! Domain layer with the document model, entities, errors and ports.

/// Host document model.
pub mod dom;
/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{ContentFamily, ContentTarget, EmbedSettings, ResolvedContent};
pub use errors::{EmbedError, FetchError, ResolveError};
pub use ports::{ContentResolver, EmbedRenderer, HttpTransport};
