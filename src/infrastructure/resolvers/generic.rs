use async_trait::async_trait;
use url::Url;

use super::{favicon_url, host_label};
use crate::domain::entities::{ContentFamily, ContentTarget, ResolvedContent};
use crate::domain::errors::ResolveError;
use crate::domain::ports::ContentResolver;

/// Unknown links: host, favicon and the URL itself.
pub struct GenericResolver;

#[async_trait]
impl ContentResolver for GenericResolver {
    fn family(&self) -> ContentFamily {
        ContentFamily::Generic
    }

    async fn resolve(
        &self,
        url: &Url,
        target: &ContentTarget,
    ) -> Result<ResolvedContent, ResolveError> {
        if *target != ContentTarget::Generic {
            return Err(ResolveError::declined(ContentFamily::Generic, "not a generic link"));
        }

        Ok(ResolvedContent::new(target, url.clone(), url.as_str())
            .with_platform(host_label(url))
            .with_thumbnail(favicon_url(url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_generic_fields() {
        let url = Url::parse("https://www.example.org/some/page").unwrap();

        let content = assert_ok!(GenericResolver.resolve(&url, &ContentTarget::Generic).await);

        assert_eq!(content.platform, "example.org");
        assert_eq!(content.title, "https://www.example.org/some/page");
        assert_eq!(
            content.thumbnail.as_deref(),
            Some("https://www.example.org/favicon.ico")
        );
        assert_eq!(content.family, ContentFamily::Generic);
    }

    #[tokio::test]
    async fn test_routed_targets_are_declined() {
        let url = Url::parse("https://discord.gg/xyz").unwrap();
        let target = ContentTarget::DiscordInvite { code: "xyz".into() };

        let err = assert_err!(GenericResolver.resolve(&url, &target).await);
        assert!(matches!(err, ResolveError::Declined { .. }));
    }
}
