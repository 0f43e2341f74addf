//! Pure classification of URLs into content targets.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::domain::entities::{ContentTarget, WebSite};

const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "webp", "bmp", "svg"];
const IMAGE_HOSTS: [&str; 3] = ["i.imgur.com", "cdn.discordapp.com", "media.discordapp.net"];

const YOUTUBE_RESERVED: [&str; 8] = [
    "watch", "playlist", "results", "feed", "premium", "shorts", "embed", "live",
];
const TWITCH_RESERVED: [&str; 9] = [
    "directory",
    "settings",
    "search",
    "downloads",
    "turbo",
    "jobs",
    "p",
    "prime",
    "videos",
];

static TWITCH_SUB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^/(?:subs/([a-z0-9_]+)|([a-z0-9_]+)/subs?)/?$").unwrap()
});
static TWITCH_CLIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^/(?:[^/]+/)?clip/([a-z0-9_-]+)").unwrap());
static TWITCH_VIDEO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/videos/[0-9]+").unwrap());
static TWITCH_CHANNEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^/([a-z0-9_]+)/?$").unwrap());
static DISCORD_INVITE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(invite/)?([A-Za-z0-9_-]+)/?$").unwrap());
static STEAM_APP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^/app/(\d+)").unwrap());

/// Lowercased host with a leading `www.` removed.
#[must_use]
pub fn clean_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

/// Detects direct images by extension or by well-known image host.
///
/// Returns the lowercase extension when the path has one.
#[must_use]
pub fn detect_image(url: &Url) -> Option<Option<String>> {
    let path = url.path().to_ascii_lowercase();
    let extension = path
        .rsplit('/')
        .next()
        .and_then(|file| file.rsplit_once('.'))
        .map(|(_, ext)| ext.to_string());

    if let Some(ext) = &extension
        && IMAGE_EXTENSIONS.contains(&ext.as_str())
    {
        return Some(extension);
    }

    let host = clean_host(url)?;
    IMAGE_HOSTS
        .iter()
        .any(|image_host| host == *image_host || host.ends_with(&format!(".{image_host}")))
        .then_some(extension)
}

/// Maps a URL to its content target.
///
/// The image check runs first, and only when `images_enabled`. Unknown shapes
/// on known hosts and unknown hosts both map to `ContentTarget::Generic`.
#[must_use]
pub fn classify(url: &Url, images_enabled: bool) -> ContentTarget {
    if images_enabled && let Some(extension) = detect_image(url) {
        return ContentTarget::Image { extension };
    }

    let Some(host) = clean_host(url) else {
        return ContentTarget::Generic;
    };

    match host.as_str() {
        "youtube.com" | "m.youtube.com" | "music.youtube.com" | "youtu.be" => {
            classify_youtube(url, &host)
        }
        "twitch.tv" | "m.twitch.tv" | "subs.twitch.tv" | "clips.twitch.tv" => {
            classify_twitch(url, &host)
        }
        "discord.gg" | "discord.com" | "discordapp.com" => classify_discord(url, &host),
        "store.steampowered.com" | "steampowered.com" => classify_steam(url),
        "ko-fi.com" => ContentTarget::WebPage(WebSite::KoFi),
        "eneba.com" => ContentTarget::WebPage(WebSite::Eneba),
        h if h == "gamesplanet.com" || h.ends_with(".gamesplanet.com") => ContentTarget::StorePage,
        _ => ContentTarget::Generic,
    }
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, v)| k == key && !v.is_empty())
        .map(|(_, v)| v.into_owned())
}

fn segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

fn classify_youtube(url: &Url, host: &str) -> ContentTarget {
    if let Some(id) = query_value(url, "list") {
        return ContentTarget::YouTubePlaylist { id };
    }

    let segments = segments(url);
    if host == "youtu.be" {
        return segments
            .first()
            .map_or(ContentTarget::Generic, |id| ContentTarget::YouTubeVideo {
                id: (*id).to_string(),
            });
    }

    if let Some(id) = query_value(url, "v") {
        return ContentTarget::YouTubeVideo { id };
    }

    match segments.as_slice() {
        ["shorts" | "embed" | "live", id] => ContentTarget::YouTubeVideo {
            id: (*id).to_string(),
        },
        [handle, ..] if handle.starts_with('@') => ContentTarget::YouTubeChannel {
            handle: (*handle).to_string(),
        },
        ["channel" | "c" | "user", name, ..] => ContentTarget::YouTubeChannel {
            handle: (*name).to_string(),
        },
        [name] if !YOUTUBE_RESERVED.contains(name) => ContentTarget::YouTubeChannel {
            handle: format!("@{name}"),
        },
        _ => ContentTarget::Generic,
    }
}

fn classify_twitch(url: &Url, host: &str) -> ContentTarget {
    let path = url.path();

    if host == "clips.twitch.tv" {
        return segments(url)
            .first()
            .map_or(ContentTarget::Generic, |slug| ContentTarget::TwitchClip {
                slug: (*slug).to_string(),
            });
    }

    if let Some(caps) = TWITCH_SUB_RE.captures(path)
        && let Some(login) = caps.get(1).or_else(|| caps.get(2))
    {
        return ContentTarget::TwitchSub {
            login: login.as_str().to_ascii_lowercase(),
        };
    }

    if let Some(caps) = TWITCH_CLIP_RE.captures(path) {
        return ContentTarget::TwitchClip {
            slug: caps[1].to_string(),
        };
    }

    if TWITCH_VIDEO_RE.is_match(path) {
        return ContentTarget::Generic;
    }

    if let Some(caps) = TWITCH_CHANNEL_RE.captures(path) {
        let login = caps[1].to_ascii_lowercase();
        if TWITCH_RESERVED.contains(&login.as_str()) {
            return ContentTarget::Generic;
        }
        return if host == "subs.twitch.tv" {
            ContentTarget::TwitchSub { login }
        } else {
            ContentTarget::TwitchChannel { login }
        };
    }

    ContentTarget::Generic
}

fn classify_discord(url: &Url, host: &str) -> ContentTarget {
    let Some(caps) = DISCORD_INVITE_RE.captures(url.path()) else {
        return ContentTarget::Generic;
    };
    // On discord.com only /invite/<code> is an invite; other single segments are pages.
    if host != "discord.gg" && caps.get(1).is_none() {
        return ContentTarget::Generic;
    }
    ContentTarget::DiscordInvite {
        code: caps[2].to_string(),
    }
}

fn classify_steam(url: &Url) -> ContentTarget {
    STEAM_APP_RE
        .captures(url.path())
        .and_then(|caps| caps[1].parse().ok())
        .map_or(ContentTarget::SteamPage, |app_id| ContentTarget::SteamApp {
            app_id,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn target(url: &str) -> ContentTarget {
        classify(&Url::parse(url).unwrap(), true)
    }

    fn video(id: &str) -> ContentTarget {
        ContentTarget::YouTubeVideo { id: id.to_string() }
    }

    fn channel(handle: &str) -> ContentTarget {
        ContentTarget::YouTubeChannel {
            handle: handle.to_string(),
        }
    }

    #[test_case("https://youtu.be/abc123", video("abc123") ; "short_link")]
    #[test_case("https://www.youtube.com/watch?v=dQw4w9WgXcQ", video("dQw4w9WgXcQ") ; "watch")]
    #[test_case("https://m.youtube.com/watch?v=xyz&t=10", video("xyz") ; "mobile_with_time")]
    #[test_case("https://youtube.com/shorts/s1", video("s1") ; "shorts")]
    #[test_case("https://www.youtube.com/watch?v=a&list=PL1", ContentTarget::YouTubePlaylist { id: "PL1".into() } ; "list_wins")]
    #[test_case("https://www.youtube.com/playlist?list=PL2", ContentTarget::YouTubePlaylist { id: "PL2".into() } ; "playlist")]
    #[test_case("https://www.youtube.com/@creator", channel("@creator") ; "handle")]
    #[test_case("https://www.youtube.com/channel/UC123", channel("UC123") ; "channel_id")]
    #[test_case("https://www.youtube.com/c/legacy", channel("legacy") ; "custom_url")]
    #[test_case("https://www.youtube.com/user/old", channel("old") ; "user")]
    #[test_case("https://www.youtube.com/someone", channel("@someone") ; "bare_name")]
    #[test_case("https://www.youtube.com/watch", ContentTarget::Generic ; "watch_without_id")]
    #[test_case("https://www.youtube.com/feed/trending", ContentTarget::Generic ; "unknown_shape")]
    fn test_youtube(url: &str, expected: ContentTarget) {
        assert_eq!(target(url), expected);
    }

    #[test_case("https://www.twitch.tv/streamer", ContentTarget::TwitchChannel { login: "streamer".into() } ; "channel")]
    #[test_case("https://www.twitch.tv/Streamer/", ContentTarget::TwitchChannel { login: "streamer".into() } ; "channel_slash")]
    #[test_case("https://www.twitch.tv/streamer/clip/Funny-Slug_1", ContentTarget::TwitchClip { slug: "Funny-Slug_1".into() } ; "clip")]
    #[test_case("https://clips.twitch.tv/FunnySlug", ContentTarget::TwitchClip { slug: "FunnySlug".into() } ; "clips_host")]
    #[test_case("https://www.twitch.tv/subs/streamer", ContentTarget::TwitchSub { login: "streamer".into() } ; "subs_prefix")]
    #[test_case("https://www.twitch.tv/streamer/sub", ContentTarget::TwitchSub { login: "streamer".into() } ; "sub_suffix")]
    #[test_case("https://subs.twitch.tv/streamer", ContentTarget::TwitchSub { login: "streamer".into() } ; "subs_host")]
    #[test_case("https://www.twitch.tv/videos/123456", ContentTarget::Generic ; "vod")]
    #[test_case("https://www.twitch.tv/directory", ContentTarget::Generic ; "reserved")]
    fn test_twitch(url: &str, expected: ContentTarget) {
        assert_eq!(target(url), expected);
    }

    #[test_case("https://discord.gg/xyz", ContentTarget::DiscordInvite { code: "xyz".into() } ; "short")]
    #[test_case("https://discord.com/invite/abc-1", ContentTarget::DiscordInvite { code: "abc-1".into() } ; "long")]
    #[test_case("https://discord.com/channels", ContentTarget::Generic ; "not_invite")]
    #[test_case("https://store.steampowered.com/app/100/", ContentTarget::SteamApp { app_id: 100 } ; "steam_app")]
    #[test_case("https://store.steampowered.com/news/app/100", ContentTarget::SteamPage ; "steam_news")]
    #[test_case("https://fr.gamesplanet.com/game/some-game", ContentTarget::StorePage ; "gamesplanet")]
    #[test_case("https://ko-fi.com/artist", ContentTarget::WebPage(WebSite::KoFi) ; "kofi")]
    #[test_case("https://www.eneba.com/game", ContentTarget::WebPage(WebSite::Eneba) ; "eneba")]
    #[test_case("https://example.com/article", ContentTarget::Generic ; "unknown_host")]
    fn test_other_hosts(url: &str, expected: ContentTarget) {
        assert_eq!(target(url), expected);
    }

    #[test_case("https://example.com/cat.PNG", Some("png") ; "extension")]
    #[test_case("https://i.imgur.com/abc", None ; "image_host")]
    #[test_case("https://cdn.discordapp.com/attachments/1/2/shot.webp", Some("webp") ; "discord_cdn")]
    #[test_case("https://www.youtube.com/thumb.jpg", Some("jpg") ; "image_check_runs_first")]
    fn test_images(url: &str, extension: Option<&str>) {
        assert_eq!(
            target(url),
            ContentTarget::Image {
                extension: extension.map(str::to_string)
            }
        );
    }

    #[test]
    fn test_images_disabled_falls_through_to_host() {
        let url = Url::parse("https://example.com/cat.png").unwrap();
        assert_eq!(classify(&url, false), ContentTarget::Generic);
    }

    #[test]
    fn test_clean_host() {
        let url = Url::parse("https://WWW.YouTube.com/x").unwrap();
        assert_eq!(clean_host(&url).as_deref(), Some("youtube.com"));
    }
}
