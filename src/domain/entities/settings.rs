//! Embed settings read at resolution and regeneration time.

use serde::{Deserialize, Serialize};

use super::content::{ContentFamily, ContentTarget, WebSite};

/// Per-family switches. Everything is on by default.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Master switch. When off every link is declined.
    pub enabled: bool,
    /// YouTube videos, playlists and channels.
    pub youtube: bool,
    /// Twitch clips, channels and sub pages.
    pub twitch: bool,
    /// Discord invites.
    pub discord: bool,
    /// Steam store pages.
    pub steam: bool,
    /// GamesPlanet store pages.
    pub gamesplanet: bool,
    /// Pages described by Open Graph tags.
    pub web_pages: bool,
    /// Ko-fi pages (also needs `web_pages`).
    pub kofi: bool,
    /// Eneba pages (also needs `web_pages`).
    pub eneba: bool,
    /// Direct images.
    pub images: bool,
    /// Unknown links.
    pub generic: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enabled: true,
            youtube: true,
            twitch: true,
            discord: true,
            steam: true,
            gamesplanet: true,
            web_pages: true,
            kofi: true,
            eneba: true,
            images: true,
            generic: true,
        }
    }
}

impl FeatureFlags {
    /// Returns whether the family switch is on. Ignores the master switch.
    #[must_use]
    pub const fn family_enabled(&self, family: ContentFamily) -> bool {
        match family {
            ContentFamily::YouTube => self.youtube,
            ContentFamily::Twitch => self.twitch,
            ContentFamily::Discord => self.discord,
            ContentFamily::Steam => self.steam,
            ContentFamily::GamesPlanet => self.gamesplanet,
            ContentFamily::WebPage => self.web_pages,
            ContentFamily::Image => self.images,
            ContentFamily::Generic => self.generic,
        }
    }

    /// Returns whether `target` may be resolved. Ignores the master switch.
    #[must_use]
    pub const fn allows(&self, target: &ContentTarget) -> bool {
        match target {
            ContentTarget::SteamPage => self.steam && self.web_pages,
            ContentTarget::WebPage(WebSite::KoFi) => self.web_pages && self.kofi,
            ContentTarget::WebPage(WebSite::Eneba) => self.web_pages && self.eneba,
            other => self.family_enabled(other.family()),
        }
    }

    /// Flips one family switch and returns its new value.
    pub fn toggle(&mut self, family: ContentFamily) -> bool {
        let slot = match family {
            ContentFamily::YouTube => &mut self.youtube,
            ContentFamily::Twitch => &mut self.twitch,
            ContentFamily::Discord => &mut self.discord,
            ContentFamily::Steam => &mut self.steam,
            ContentFamily::GamesPlanet => &mut self.gamesplanet,
            ContentFamily::WebPage => &mut self.web_pages,
            ContentFamily::Image => &mut self.images,
            ContentFamily::Generic => &mut self.generic,
        };
        *slot = !*slot;
        *slot
    }
}

/// Visual style of rendered embeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbedStyle {
    /// Translucent light text on a dark feed.
    #[default]
    DarkGlass,
    /// Translucent dark text on a light feed.
    LightGlass,
}

impl EmbedStyle {
    /// Name as written in settings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DarkGlass => "dark-glass",
            Self::LightGlass => "light-glass",
        }
    }
}

impl std::fmt::Display for EmbedStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmbedStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "dark-glass" | "dark" => Ok(Self::DarkGlass),
            "light-glass" | "light" => Ok(Self::LightGlass),
            other => Err(format!("unknown embed style: {other}")),
        }
    }
}

/// Presentation parameters applied by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Presentation {
    /// Embed style.
    pub style: EmbedStyle,
    /// Maximum image width in pixels.
    pub max_image_width: u32,
    /// Maximum image height in pixels.
    pub max_image_height: u32,
}

impl Presentation {
    /// Allowed image width range.
    pub const WIDTH_RANGE: (u32, u32) = (100, 800);
    /// Allowed image height range.
    pub const HEIGHT_RANGE: (u32, u32) = (100, 600);

    /// Returns a copy with image bounds clamped to the allowed ranges.
    #[must_use]
    pub const fn clamped(self) -> Self {
        Self {
            style: self.style,
            max_image_width: clamp(self.max_image_width, Self::WIDTH_RANGE),
            max_image_height: clamp(self.max_image_height, Self::HEIGHT_RANGE),
        }
    }
}

const fn clamp(value: u32, (min, max): (u32, u32)) -> u32 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            style: EmbedStyle::DarkGlass,
            max_image_width: 300,
            max_image_height: 200,
        }
    }
}

/// Settings snapshot passed explicitly to the registry and the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbedSettings {
    /// Feature switches.
    pub features: FeatureFlags,
    /// Presentation parameters.
    pub presentation: Presentation,
}

impl EmbedSettings {
    /// Creates settings with clamped presentation bounds.
    #[must_use]
    pub const fn new(features: FeatureFlags, presentation: Presentation) -> Self {
        Self {
            features,
            presentation: presentation.clamped(),
        }
    }
}
