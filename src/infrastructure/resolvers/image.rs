use async_trait::async_trait;
use url::Url;

use super::host_label;
use crate::domain::entities::{ContentFamily, ContentTarget, ResolvedContent};
use crate::domain::errors::ResolveError;
use crate::domain::ports::ContentResolver;

/// Direct image links. Needs no network: the URL is the thumbnail.
pub struct ImageResolver;

fn file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map_or_else(|| host_label(url), str::to_string)
}

#[async_trait]
impl ContentResolver for ImageResolver {
    fn family(&self) -> ContentFamily {
        ContentFamily::Image
    }

    async fn resolve(
        &self,
        url: &Url,
        target: &ContentTarget,
    ) -> Result<ResolvedContent, ResolveError> {
        let ContentTarget::Image { extension } = target else {
            return Err(ResolveError::declined(ContentFamily::Image, "not an image"));
        };

        let mut content = ResolvedContent::new(target, url.clone(), file_name(url))
            .with_platform(host_label(url))
            .with_thumbnail(Some(url.to_string()));
        if let Some(extension) = extension {
            content = content.with_stat("format", extension.to_ascii_uppercase());
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;
    use tokio_test::assert_ok;

    #[test_case("https://i.imgur.com/cat.png", "cat.png")]
    #[test_case("https://i.imgur.com/", "i.imgur.com")]
    fn test_file_name(url: &str, expected: &str) {
        assert_eq!(file_name(&Url::parse(url).unwrap()), expected);
    }

    #[tokio::test]
    async fn test_image_fields() {
        let url = Url::parse("https://cdn.example.com/pics/cat.webp?size=2").unwrap();
        let target = ContentTarget::Image {
            extension: Some("webp".to_string()),
        };

        let content = assert_ok!(ImageResolver.resolve(&url, &target).await);

        assert_eq!(content.title, "cat.webp");
        assert_eq!(content.platform, "cdn.example.com");
        assert_eq!(content.thumbnail.as_deref(), Some(url.as_str()));
        assert_eq!(content.stats, [("format".to_string(), "WEBP".to_string())]);
    }
}
