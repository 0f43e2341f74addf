use async_trait::async_trait;
use tracing::debug;
use url::Url;

use super::dto::DiscordInvite;
use super::{fetch_json, format_compact};
use crate::application::services::RequestCache;
use crate::domain::entities::{ContentFamily, ContentTarget, ResolvedContent};
use crate::domain::errors::ResolveError;
use crate::domain::ports::ContentResolver;

const FAMILY: ContentFamily = ContentFamily::Discord;
const INVITE_API: &str = "https://discord.com/api/v9/invites";
const ICON_CDN: &str = "https://cdn.discordapp.com/icons";

/// Invite links through the public invite endpoint.
pub struct DiscordResolver {
    cache: RequestCache,
}

impl DiscordResolver {
    /// Creates a resolver querying the invite API through `cache`.
    #[must_use]
    pub const fn new(cache: RequestCache) -> Self {
        Self { cache }
    }

    fn invite_url(code: &str) -> Result<Url, ResolveError> {
        let mut url = Url::parse(INVITE_API)
            .map_err(|e| ResolveError::payload(FAMILY, e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| ResolveError::payload(FAMILY, "invite endpoint cannot take a path"))?
            .push(code);
        url.query_pairs_mut().append_pair("with_counts", "true");
        Ok(url)
    }
}

#[async_trait]
impl ContentResolver for DiscordResolver {
    fn family(&self) -> ContentFamily {
        FAMILY
    }

    async fn resolve(
        &self,
        url: &Url,
        target: &ContentTarget,
    ) -> Result<ResolvedContent, ResolveError> {
        let ContentTarget::DiscordInvite { code } = target else {
            return Err(ResolveError::declined(FAMILY, "not an invite"));
        };
        debug!(url = %url, %code, "Resolving Discord invite");

        let invite: DiscordInvite = fetch_json(&self.cache, FAMILY, Self::invite_url(code)?).await?;
        let guild = invite
            .guild
            .ok_or(ResolveError::EmptyResult { family: FAMILY })?;

        let icon = guild
            .icon
            .as_deref()
            .map(|icon| format!("{ICON_CDN}/{}/{icon}.png", guild.id));
        let mut content = ResolvedContent::new(target, url.clone(), guild.name).with_thumbnail(icon);
        if let Some(members) = invite.approximate_member_count {
            content = content.with_stat("members", format_compact(members));
        }
        if let Some(online) = invite.approximate_presence_count {
            content = content.with_stat("online", format_compact(online));
        }
        if let Some(inviter) = invite.inviter.as_ref().and_then(|i| i.display_name()) {
            content = content.with_subtitle(format!("Invited by {inviter}"));
        }
        Ok(content)
    }
}
