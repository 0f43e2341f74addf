//! Port definitions.

mod content_resolver;
mod embed_renderer;
mod http_transport;

pub use content_resolver::ContentResolver;
pub use embed_renderer::{
    BANNER_CLASS, EMBED_CLASS, EMBED_TYPE_ATTR, EmbedRenderer, ORIGINAL_URL_ATTR,
};
pub use http_transport::{
    HttpTransport, RequestDescriptor, ResponseShape, TransportError, TransportResponse,
};
