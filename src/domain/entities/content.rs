//! Content families, routed targets and resolved content.

use std::fmt;
use std::str::FromStr;

use url::Url;

/// Closed set of content families. Each family has one resolver slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum ContentFamily {
    YouTube,
    Twitch,
    Discord,
    Steam,
    GamesPlanet,
    /// Pages described by their Open Graph tags.
    WebPage,
    Image,
    /// Unknown links rendered from the URL alone.
    Generic,
}

impl ContentFamily {
    /// All families, in display order.
    pub const ALL: [Self; 8] = [
        Self::YouTube,
        Self::Twitch,
        Self::Discord,
        Self::Steam,
        Self::GamesPlanet,
        Self::WebPage,
        Self::Image,
        Self::Generic,
    ];

    /// Tag written to `data-embed-type`.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::YouTube => "youtube",
            Self::Twitch => "twitch",
            Self::Discord => "discord",
            Self::Steam => "steam",
            Self::GamesPlanet => "gamesplanet",
            Self::WebPage => "meta",
            Self::Image => "image",
            Self::Generic => "default",
        }
    }

    /// Human readable platform name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::YouTube => "YouTube",
            Self::Twitch => "Twitch",
            Self::Discord => "Discord",
            Self::Steam => "Steam",
            Self::GamesPlanet => "GamesPlanet",
            Self::WebPage => "Web page",
            Self::Image => "Image",
            Self::Generic => "Link",
        }
    }
}

impl fmt::Display for ContentFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Returned when a family tag is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown content family: {0}")]
pub struct UnknownFamily(pub String);

impl FromStr for ContentFamily {
    type Err = UnknownFamily;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        match needle.as_str() {
            "web" | "webpage" => return Ok(Self::WebPage),
            "generic" => return Ok(Self::Generic),
            _ => {}
        }
        Self::ALL
            .into_iter()
            .find(|family| family.tag() == needle)
            .ok_or(UnknownFamily(s.to_string()))
    }
}

/// Web pages that have their own toggle under the web-page family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum WebSite {
    KoFi,
    Eneba,
}

/// What a URL points at, as decided by classification.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ContentTarget {
    YouTubeVideo { id: String },
    YouTubePlaylist { id: String },
    /// Handle, channel id, or legacy name as it appears in the URL.
    YouTubeChannel { handle: String },
    TwitchClip { slug: String },
    TwitchChannel { login: String },
    TwitchSub { login: String },
    DiscordInvite { code: String },
    SteamApp { app_id: u64 },
    /// Steam pages other than apps (news, curators, ...).
    SteamPage,
    /// A GamesPlanet store page.
    StorePage,
    WebPage(WebSite),
    Image { extension: Option<String> },
    Generic,
}

impl ContentTarget {
    /// Family whose resolver handles this target.
    #[must_use]
    pub const fn family(&self) -> ContentFamily {
        match self {
            Self::YouTubeVideo { .. } | Self::YouTubePlaylist { .. } | Self::YouTubeChannel { .. } => {
                ContentFamily::YouTube
            }
            Self::TwitchClip { .. } | Self::TwitchChannel { .. } | Self::TwitchSub { .. } => {
                ContentFamily::Twitch
            }
            Self::DiscordInvite { .. } => ContentFamily::Discord,
            Self::SteamApp { .. } => ContentFamily::Steam,
            Self::SteamPage | Self::WebPage(_) => ContentFamily::WebPage,
            Self::StorePage => ContentFamily::GamesPlanet,
            Self::Image { .. } => ContentFamily::Image,
            Self::Generic => ContentFamily::Generic,
        }
    }

    /// Short label for the kind of content, shown in embed headers.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::YouTubeVideo { .. } => "Video",
            Self::YouTubePlaylist { .. } => "Playlist",
            Self::YouTubeChannel { .. } | Self::TwitchChannel { .. } => "Channel",
            Self::TwitchClip { .. } => "Clip",
            Self::TwitchSub { .. } => "Subscription",
            Self::DiscordInvite { .. } => "Invite",
            Self::SteamApp { .. } => "Game",
            Self::SteamPage | Self::StorePage | Self::WebPage(_) => "Page",
            Self::Image { .. } => "Image",
            Self::Generic => "Link",
        }
    }
}

/// Structured result of a successful resolution, handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub struct ResolvedContent {
    pub family: ContentFamily,
    pub url: Url,
    /// Header text, e.g. "YouTube - Video" or "GamesPlanet × Partner".
    pub platform: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    /// Small label/value facts such as view counts or a price.
    pub stats: Vec<(String, String)>,
    pub live: bool,
}

impl ResolvedContent {
    /// Creates content titled `title`, labelled with the family and kind of `target`.
    #[must_use]
    pub fn new(target: &ContentTarget, url: Url, title: impl Into<String>) -> Self {
        let family = target.family();
        Self {
            family,
            url,
            platform: format!("{} - {}", family.display_name(), target.kind_label()),
            title: title.into(),
            subtitle: None,
            description: None,
            thumbnail: None,
            stats: Vec::new(),
            live: false,
        }
    }

    /// Overrides the platform label.
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Sets the subtitle.
    #[must_use]
    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    /// Sets the description, ignoring blank text.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }

    /// Sets the thumbnail URL.
    #[must_use]
    pub fn with_thumbnail(mut self, thumbnail: Option<String>) -> Self {
        self.thumbnail = thumbnail.filter(|t| !t.is_empty());
        self
    }

    /// Appends a labelled statistic.
    #[must_use]
    pub fn with_stat(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.stats.push((label.into(), value.into()));
        self
    }

    /// Flags a live stream.
    #[must_use]
    pub fn with_live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }
}
