//! Port for building the nodes that replace links.

use url::Url;

use crate::domain::dom::{Document, NodeRef};
use crate::domain::entities::{Presentation, ResolvedContent};

/// Attribute holding the URL an embed was built from.
pub const ORIGINAL_URL_ATTR: &str = "data-original-url";
/// Attribute holding the family tag of an embed.
pub const EMBED_TYPE_ATTR: &str = "data-embed-type";
/// Class carried by every rendered embed.
pub const EMBED_CLASS: &str = "coven-embed";
/// Class of the ready banner.
pub const BANNER_CLASS: &str = "embed-banner";

/// Builds detached nodes for the controller to insert.
///
/// Visual design lives entirely behind this trait.
pub trait EmbedRenderer: Send + Sync {
    /// Loading indicator shown while a link resolves.
    fn placeholder(&self, doc: &Document, url: &Url) -> NodeRef;

    /// Rendered embed for resolved content.
    fn embed(&self, doc: &Document, content: &ResolvedContent, presentation: &Presentation)
    -> NodeRef;

    /// Plain clickable link to `url`.
    fn plain_link(&self, doc: &Document, url: &Url) -> NodeRef;

    /// Re-applies presentation parameters to an existing embed.
    fn apply_presentation(&self, embed: &NodeRef, presentation: &Presentation);

    /// Banner announcing the embedder is active.
    fn banner(&self, doc: &Document) -> NodeRef;
}
