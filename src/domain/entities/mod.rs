//! Domain entity definitions.

mod container;
mod content;
mod embed;
mod link;
mod settings;

pub use container::FeedContainer;
pub use content::{ContentFamily, ContentTarget, ResolvedContent, UnknownFamily, WebSite};
pub use embed::EmbedRecord;
pub use link::{LinkCandidate, LinkState};
pub use settings::{EmbedSettings, EmbedStyle, FeatureFlags, Presentation};
