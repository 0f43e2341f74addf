use async_trait::async_trait;
use tracing::debug;
use url::Url;

use super::dto::{TwitchChannel, TwitchClipResponse};
use super::{endpoint, fetch_json, format_compact};
use crate::application::services::RequestCache;
use crate::domain::entities::{ContentFamily, ContentTarget, ResolvedContent};
use crate::domain::errors::ResolveError;
use crate::domain::ports::ContentResolver;

const FAMILY: ContentFamily = ContentFamily::Twitch;

/// Clips, channels and sub pages. Channel and sub pages share one lookup.
pub struct TwitchResolver {
    cache: RequestCache,
    api_base: Url,
}

impl TwitchResolver {
    /// Creates a resolver querying `api_base` through `cache`.
    #[must_use]
    pub const fn new(cache: RequestCache, api_base: Url) -> Self {
        Self { cache, api_base }
    }

    async fn clip(
        &self,
        url: &Url,
        target: &ContentTarget,
        slug: &str,
    ) -> Result<ResolvedContent, ResolveError> {
        let api = endpoint(&self.api_base, FAMILY, "/twitch/clip", &[("id", slug)])?;
        let response: TwitchClipResponse = fetch_json(&self.cache, FAMILY, api).await?;
        let clip = response
            .clip
            .filter(|clip| !clip.title.is_empty())
            .ok_or(ResolveError::EmptyResult { family: FAMILY })?;

        let mut content = ResolvedContent::new(target, url.clone(), clip.title)
            .with_thumbnail(clip.thumbnail_url);
        if let Some(creator) = clip.creator_name {
            content = content.with_subtitle(format!("Clipped by {creator}"));
        }
        if let Some(views) = clip.view_count {
            content = content.with_stat("views", format_compact(views.value()));
        }
        Ok(content)
    }

    async fn channel(
        &self,
        url: &Url,
        target: &ContentTarget,
        login: &str,
        sub_page: bool,
    ) -> Result<ResolvedContent, ResolveError> {
        let api = endpoint(&self.api_base, FAMILY, "/twitch/channel", &[("username", login)])?;
        let channel: TwitchChannel = fetch_json(&self.cache, FAMILY, api).await?;
        let user = channel
            .user
            .filter(|user| !user.display_name.is_empty())
            .ok_or(ResolveError::EmptyResult { family: FAMILY })?;

        let title = if sub_page {
            format!("Subscribe to {}", user.display_name)
        } else {
            user.display_name
        };
        let mut content = ResolvedContent::new(target, url.clone(), title)
            .with_thumbnail(user.profile_image_url)
            .with_description(user.description);
        if sub_page {
            return Ok(content);
        }

        content = content.with_live(channel.is_live);
        if channel.is_live
            && let Some(stream) = channel.stream
        {
            if let Some(game) = stream.game_name {
                content = content.with_subtitle(game);
            }
            if let Some(viewers) = stream.viewer_count {
                content = content.with_stat("viewers", format_compact(viewers.value()));
            }
        }
        Ok(content)
    }
}

#[async_trait]
impl ContentResolver for TwitchResolver {
    fn family(&self) -> ContentFamily {
        FAMILY
    }

    async fn resolve(
        &self,
        url: &Url,
        target: &ContentTarget,
    ) -> Result<ResolvedContent, ResolveError> {
        debug!(url = %url, ?target, "Resolving Twitch link");
        match target {
            ContentTarget::TwitchClip { slug } => self.clip(url, target, slug).await,
            ContentTarget::TwitchChannel { login } => self.channel(url, target, login, false).await,
            ContentTarget::TwitchSub { login } => self.channel(url, target, login, true).await,
            _ => Err(ResolveError::declined(FAMILY, "not a Twitch target")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::resolvers::testing;
    use serde_json::json;
    use tokio_test::assert_ok;

    const CHANNEL_API: &str = "https://api.the-coven.fr/twitch/channel?username=somebody";

    fn live_channel() -> serde_json::Value {
        json!({
            "user": {
                "display_name": "Somebody",
                "profile_image_url": "https://static-cdn.jtvnw.net/p.png",
                "description": "Speedruns"
            },
            "is_live": true,
            "stream": { "viewer_count": 1234, "game_name": "Celeste" }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_channel() {
        let (transport, cache) = testing::cache();
        transport.push_json(CHANNEL_API, &live_channel());
        let resolver = TwitchResolver::new(cache, Url::parse("https://api.the-coven.fr").unwrap());
        let url = Url::parse("https://www.twitch.tv/somebody").unwrap();

        let content = assert_ok!(
            resolver
                .resolve(&url, &ContentTarget::TwitchChannel { login: "somebody".into() })
                .await
        );

        assert!(content.live);
        assert_eq!(content.title, "Somebody");
        assert_eq!(content.subtitle.as_deref(), Some("Celeste"));
        assert_eq!(content.stats, [("viewers".to_string(), "1.2K".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sub_page_reuses_channel_lookup() {
        let (transport, cache) = testing::cache();
        transport.push_json(CHANNEL_API, &live_channel());
        let resolver = TwitchResolver::new(cache, Url::parse("https://api.the-coven.fr").unwrap());
        let channel_url = Url::parse("https://www.twitch.tv/somebody").unwrap();
        let sub_url = Url::parse("https://www.twitch.tv/subs/somebody").unwrap();

        assert_ok!(
            resolver
                .resolve(&channel_url, &ContentTarget::TwitchChannel { login: "somebody".into() })
                .await
        );
        let sub = assert_ok!(
            resolver
                .resolve(&sub_url, &ContentTarget::TwitchSub { login: "somebody".into() })
                .await
        );

        assert_eq!(sub.title, "Subscribe to Somebody");
        assert!(!sub.live);
        assert_eq!(sub.platform, "Twitch - Subscription");
        assert_eq!(transport.calls_for(CHANNEL_API), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_clip_is_empty() {
        let (transport, cache) = testing::cache();
        transport.push_json(
            "https://api.the-coven.fr/twitch/clip?id=FunnySlug",
            &json!({ "clip": null }),
        );
        let resolver = TwitchResolver::new(cache, Url::parse("https://api.the-coven.fr").unwrap());
        let url = Url::parse("https://clips.twitch.tv/FunnySlug").unwrap();

        let result = resolver
            .resolve(&url, &ContentTarget::TwitchClip { slug: "FunnySlug".into() })
            .await;

        assert!(matches!(result, Err(ResolveError::EmptyResult { .. })));
    }
}
