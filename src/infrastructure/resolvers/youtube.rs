use async_trait::async_trait;
use tracing::debug;
use url::Url;

use super::dto::{YouTubeChannel, YouTubePlaylist, YouTubeVideo};
use super::{endpoint, fetch_json, format_compact};
use crate::application::services::RequestCache;
use crate::domain::entities::{ContentFamily, ContentTarget, ResolvedContent};
use crate::domain::errors::ResolveError;
use crate::domain::ports::ContentResolver;

const FAMILY: ContentFamily = ContentFamily::YouTube;

/// Videos, playlists and channels through the metadata API.
pub struct YouTubeResolver {
    cache: RequestCache,
    api_base: Url,
}

impl YouTubeResolver {
    /// Creates a resolver querying `api_base` through `cache`.
    #[must_use]
    pub const fn new(cache: RequestCache, api_base: Url) -> Self {
        Self { cache, api_base }
    }

    async fn video(
        &self,
        url: &Url,
        target: &ContentTarget,
        id: &str,
    ) -> Result<ResolvedContent, ResolveError> {
        let api = endpoint(&self.api_base, FAMILY, "/youtube/video", &[("id", id)])?;
        let video: YouTubeVideo = fetch_json(&self.cache, FAMILY, api).await?;
        if video.title.is_empty() {
            return Err(ResolveError::EmptyResult { family: FAMILY });
        }

        let mut content = ResolvedContent::new(target, url.clone(), video.title)
            .with_thumbnail(video.thumbnail.best());
        if let Some(channel) = video.channel_title {
            content = content.with_subtitle(channel);
        }
        if let Some(views) = video.view {
            content = content.with_stat("views", format_compact(views.value()));
        }
        Ok(content)
    }

    async fn playlist(
        &self,
        url: &Url,
        target: &ContentTarget,
        id: &str,
    ) -> Result<ResolvedContent, ResolveError> {
        let api = endpoint(&self.api_base, FAMILY, "/youtube/playlist", &[("id", id)])?;
        let playlist: YouTubePlaylist = fetch_json(&self.cache, FAMILY, api).await?;
        if playlist.title.is_empty() {
            return Err(ResolveError::EmptyResult { family: FAMILY });
        }

        let mut content = ResolvedContent::new(target, url.clone(), playlist.title)
            .with_thumbnail(playlist.thumbnail.best());
        if let Some(channel) = playlist.channel_title {
            content = content.with_subtitle(channel);
        }
        if let Some(count) = playlist.item_count {
            content = content.with_stat("videos", format_compact(count.value()));
        }
        Ok(content)
    }

    async fn channel(
        &self,
        url: &Url,
        target: &ContentTarget,
        handle: &str,
    ) -> Result<ResolvedContent, ResolveError> {
        let api = endpoint(
            &self.api_base,
            FAMILY,
            "/youtube/channel",
            &[("channel", handle)],
        )?;
        let channel: YouTubeChannel = fetch_json(&self.cache, FAMILY, api).await?;
        if channel.title.is_empty() {
            return Err(ResolveError::EmptyResult { family: FAMILY });
        }

        let mut content = ResolvedContent::new(target, url.clone(), channel.title)
            .with_thumbnail(channel.thumbnail);
        if let Some(stats) = channel.statistics {
            for (label, count) in [
                ("views", stats.view_count),
                ("videos", stats.video_count),
                ("subscribers", stats.subscriber_count),
            ] {
                if let Some(count) = count {
                    content = content.with_stat(label, format_compact(count.value()));
                }
            }
        }
        Ok(content)
    }
}

#[async_trait]
impl ContentResolver for YouTubeResolver {
    fn family(&self) -> ContentFamily {
        FAMILY
    }

    async fn resolve(
        &self,
        url: &Url,
        target: &ContentTarget,
    ) -> Result<ResolvedContent, ResolveError> {
        debug!(url = %url, ?target, "Resolving YouTube link");
        match target {
            ContentTarget::YouTubeVideo { id } => self.video(url, target, id).await,
            ContentTarget::YouTubePlaylist { id } => self.playlist(url, target, id).await,
            ContentTarget::YouTubeChannel { handle } => self.channel(url, target, handle).await,
            _ => Err(ResolveError::declined(FAMILY, "not a YouTube target")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::mocks::MockTransport;
    use crate::infrastructure::resolvers::testing;
    use std::sync::Arc;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    const VIDEO_API: &str = "https://api.the-coven.fr/youtube/video?id=abc123";

    fn resolver() -> (Arc<MockTransport>, YouTubeResolver) {
        let (transport, cache) = testing::cache();
        let base = Url::parse("https://api.the-coven.fr").unwrap();
        (transport, YouTubeResolver::new(cache, base))
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_fields() {
        let (transport, resolver) = resolver();
        transport.push_json(
            VIDEO_API,
            &json!({
                "title": "Never Gonna",
                "channel_title": "Rick",
                "view": "1534000",
                "thumbnail": { "default": "https://i.ytimg.com/d.jpg" }
            }),
        );
        let url = Url::parse("https://youtu.be/abc123").unwrap();
        let target = ContentTarget::YouTubeVideo { id: "abc123".into() };

        let content = assert_ok!(resolver.resolve(&url, &target).await);

        assert_eq!(content.title, "Never Gonna");
        assert_eq!(content.subtitle.as_deref(), Some("Rick"));
        assert_eq!(content.thumbnail.as_deref(), Some("https://i.ytimg.com/d.jpg"));
        assert_eq!(content.stats, [("views".to_string(), "1.5M".to_string())]);
        assert_eq!(content.platform, "YouTube - Video");
        assert_eq!(transport.calls_for(VIDEO_API), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_title_is_empty_result() {
        let (transport, resolver) = resolver();
        transport.push_json(VIDEO_API, &json!({ "title": "" }));
        let url = Url::parse("https://youtu.be/abc123").unwrap();

        let err = assert_err!(
            resolver
                .resolve(&url, &ContentTarget::YouTubeVideo { id: "abc123".into() })
                .await
        );
        assert!(matches!(err, ResolveError::EmptyResult { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_stats() {
        let (transport, resolver) = resolver();
        transport.push_json(
            "https://api.the-coven.fr/youtube/channel?channel=%40someone",
            &json!({
                "title": "Someone",
                "thumbnail": "https://yt3.ggpht.com/a.jpg",
                "statistics": { "view_count": 1200, "video_count": "42", "subscriber_count": 9876 }
            }),
        );
        let url = Url::parse("https://www.youtube.com/@someone").unwrap();
        let target = ContentTarget::YouTubeChannel { handle: "@someone".into() };

        let content = assert_ok!(resolver.resolve(&url, &target).await);

        let labels: Vec<_> = content.stats.iter().map(|(l, v)| format!("{v} {l}")).collect();
        assert_eq!(labels, ["1.2K views", "42 videos", "9.9K subscribers"]);
    }

    #[tokio::test]
    async fn test_foreign_target_is_declined() {
        let (transport, resolver) = resolver();
        let url = Url::parse("https://discord.gg/xyz").unwrap();

        let err = assert_err!(
            resolver
                .resolve(&url, &ContentTarget::DiscordInvite { code: "xyz".into() })
                .await
        );
        assert!(matches!(err, ResolveError::Declined { .. }));
        assert_eq!(transport.total_calls(), 0);
    }
}
