//! Domain error types.

mod embed_error;
mod fetch_error;
mod resolve_error;

pub use embed_error::EmbedError;
pub use fetch_error::FetchError;
pub use resolve_error::ResolveError;
