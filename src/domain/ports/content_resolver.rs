//! Port for per-family content resolvers.

use async_trait::async_trait;
use url::Url;

use crate::domain::entities::{ContentFamily, ContentTarget, ResolvedContent};
use crate::domain::errors::ResolveError;

/// Turns a routed URL into structured content for one family.
///
/// Implementations must not panic and must translate every provider failure
/// into a `ResolveError`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentResolver: Send + Sync {
    /// Family this resolver serves.
    fn family(&self) -> ContentFamily;

    /// Resolves `target`, which was classified from `url`.
    async fn resolve(
        &self,
        url: &Url,
        target: &ContentTarget,
    ) -> Result<ResolvedContent, ResolveError>;
}
