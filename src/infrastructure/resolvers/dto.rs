use std::collections::HashMap;

use serde::Deserialize;

/// Counter sent either as a number or as a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Count {
    Number(u64),
    Text(String),
}

impl Count {
    /// Numeric value; unparsable text counts as zero.
    #[must_use]
    pub fn value(&self) -> u64 {
        match self {
            Self::Number(n) => *n,
            Self::Text(text) => text.trim().parse().unwrap_or(0),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Thumbnails {
    pub maxres: Option<String>,
    pub default: Option<String>,
}

impl Thumbnails {
    pub fn best(self) -> Option<String> {
        self.maxres.or(self.default)
    }
}

#[derive(Debug, Deserialize)]
pub struct YouTubeVideo {
    #[serde(default)]
    pub title: String,
    pub channel_title: Option<String>,
    pub view: Option<Count>,
    #[serde(default)]
    pub thumbnail: Thumbnails,
}

#[derive(Debug, Deserialize)]
pub struct YouTubeChannel {
    #[serde(default)]
    pub title: String,
    pub thumbnail: Option<String>,
    pub statistics: Option<ChannelStatistics>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelStatistics {
    pub view_count: Option<Count>,
    pub video_count: Option<Count>,
    pub subscriber_count: Option<Count>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YouTubePlaylist {
    #[serde(default)]
    pub title: String,
    pub channel_title: Option<String>,
    pub item_count: Option<Count>,
    #[serde(default)]
    pub thumbnail: Thumbnails,
}

#[derive(Debug, Deserialize)]
pub struct TwitchClipResponse {
    pub clip: Option<TwitchClip>,
}

#[derive(Debug, Deserialize)]
pub struct TwitchClip {
    #[serde(default)]
    pub title: String,
    pub creator_name: Option<String>,
    pub view_count: Option<Count>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TwitchChannel {
    pub user: Option<TwitchUser>,
    #[serde(default)]
    pub is_live: bool,
    pub stream: Option<TwitchStream>,
}

#[derive(Debug, Deserialize)]
pub struct TwitchUser {
    #[serde(default)]
    pub display_name: String,
    pub description: Option<String>,
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TwitchStream {
    pub viewer_count: Option<Count>,
    pub game_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DiscordInvite {
    pub guild: Option<DiscordGuild>,
    pub approximate_member_count: Option<u64>,
    pub approximate_presence_count: Option<u64>,
    pub inviter: Option<DiscordInviter>,
}

#[derive(Debug, Deserialize)]
pub struct DiscordGuild {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub icon: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DiscordInviter {
    pub username: Option<String>,
    pub global_name: Option<String>,
}

impl DiscordInviter {
    pub fn display_name(&self) -> Option<&str> {
        self.global_name.as_deref().or(self.username.as_deref())
    }
}

/// `appdetails` answers with an object keyed by app id.
pub type SteamAppDetails = HashMap<String, SteamAppEntry>;

#[derive(Debug, Deserialize)]
pub struct SteamAppEntry {
    #[serde(default)]
    pub success: bool,
    pub data: Option<SteamApp>,
}

#[derive(Debug, Deserialize)]
pub struct SteamApp {
    #[serde(default)]
    pub name: String,
    pub short_description: Option<String>,
    #[serde(default)]
    pub is_free: bool,
    pub price_overview: Option<SteamPrice>,
    pub header_image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SteamPrice {
    pub final_formatted: String,
}
