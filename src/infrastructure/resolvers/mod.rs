//! Content resolvers, one per family, fetching through the request cache.

mod discord;
mod dto;
mod generic;
mod image;
mod page;
mod steam;
mod twitch;
mod youtube;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use url::Url;

pub use discord::DiscordResolver;
pub use generic::GenericResolver;
pub use image::ImageResolver;
pub use page::{GamesPlanetResolver, MetaPageResolver, PageMeta};
pub use steam::SteamResolver;
pub use twitch::TwitchResolver;
pub use youtube::YouTubeResolver;

use crate::application::services::{Payload, RequestCache, ResolverSet};
use crate::domain::entities::ContentFamily;
use crate::domain::errors::ResolveError;
use crate::domain::ports::RequestDescriptor;

/// Every family wired to its resolver.
#[must_use]
pub fn default_resolver_set(cache: &RequestCache, api_base: &Url) -> ResolverSet {
    ResolverSet::new(Arc::new(GenericResolver))
        .with(Arc::new(YouTubeResolver::new(cache.clone(), api_base.clone())))
        .with(Arc::new(TwitchResolver::new(cache.clone(), api_base.clone())))
        .with(Arc::new(DiscordResolver::new(cache.clone())))
        .with(Arc::new(SteamResolver::new(cache.clone())))
        .with(Arc::new(GamesPlanetResolver::new(cache.clone())))
        .with(Arc::new(MetaPageResolver::new(cache.clone())))
        .with(Arc::new(ImageResolver))
}

async fn fetch_json<T: DeserializeOwned>(
    cache: &RequestCache,
    family: ContentFamily,
    url: Url,
) -> Result<T, ResolveError> {
    match cache.fetch(&RequestDescriptor::json(url)).await {
        Ok(Payload::Json(value)) => {
            serde_json::from_value(value).map_err(|e| ResolveError::payload(family, e.to_string()))
        }
        Ok(Payload::Rejected { status }) => Err(ResolveError::ClientRejected { family, status }),
        Ok(Payload::Html(_)) => Err(ResolveError::payload(family, "expected JSON, got HTML")),
        Err(err) => Err(ResolveError::fetch(family, err)),
    }
}

async fn fetch_html(
    cache: &RequestCache,
    family: ContentFamily,
    url: Url,
) -> Result<String, ResolveError> {
    match cache.fetch(&RequestDescriptor::html(url)).await {
        Ok(Payload::Html(html)) => Ok(html),
        Ok(Payload::Rejected { status }) => Err(ResolveError::ClientRejected { family, status }),
        Ok(Payload::Json(_)) => Err(ResolveError::payload(family, "expected HTML, got JSON")),
        Err(err) => Err(ResolveError::fetch(family, err)),
    }
}

fn endpoint(
    base: &Url,
    family: ContentFamily,
    path: &str,
    query: &[(&str, &str)],
) -> Result<Url, ResolveError> {
    let mut url = base
        .join(path)
        .map_err(|e| ResolveError::payload(family, format!("bad endpoint {path}: {e}")))?;
    url.query_pairs_mut().extend_pairs(query);
    Ok(url)
}

/// Host without a leading `www.`.
fn host_label(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

fn favicon_url(url: &Url) -> Option<String> {
    url.host_str()
        .map(|host| format!("{}://{host}/favicon.ico", url.scheme()))
}

/// Formats counts as `999`, `1.2K`, `3.4M`, `1B`.
#[must_use]
pub fn format_compact(n: u64) -> String {
    const UNITS: [(u64, &str); 3] = [(1_000_000_000, "B"), (1_000_000, "M"), (1_000, "K")];

    for (size, suffix) in UNITS {
        if n >= size {
            let tenths = (n.saturating_mul(10) + size / 2) / size;
            let (whole, fraction) = (tenths / 10, tenths % 10);
            return if fraction == 0 || whole >= 100 {
                format!("{whole}{suffix}")
            } else {
                format!("{whole}.{fraction}{suffix}")
            };
        }
    }
    n.to_string()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use crate::application::services::{CachePolicy, RequestCache};
    use crate::domain::ports::mocks::MockTransport;

    pub(crate) fn cache() -> (Arc<MockTransport>, RequestCache) {
        let transport = Arc::new(MockTransport::new());
        let cache = RequestCache::new(transport.clone(), CachePolicy::default());
        (transport, cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, "0")]
    #[test_case(999, "999")]
    #[test_case(1_000, "1K")]
    #[test_case(1_234, "1.2K")]
    #[test_case(15_960, "16K")]
    #[test_case(2_500_000, "2.5M")]
    #[test_case(123_456_789, "123M")]
    #[test_case(3_000_000_000, "3B")]
    fn test_format_compact(n: u64, expected: &str) {
        assert_eq!(format_compact(n), expected);
    }

    #[test]
    fn test_endpoint_encodes_query() {
        let base = Url::parse("https://api.example.com").unwrap();
        let url = endpoint(
            &base,
            ContentFamily::YouTube,
            "/youtube/channel",
            &[("channel", "@a b")],
        )
        .unwrap();

        assert_eq!(url.as_str(), "https://api.example.com/youtube/channel?channel=%40a+b");
    }

    #[test]
    fn test_host_label() {
        let url = Url::parse("https://www.ko-fi.com/someone").unwrap();
        assert_eq!(host_label(&url), "ko-fi.com");
        assert_eq!(favicon_url(&url).as_deref(), Some("https://www.ko-fi.com/favicon.ico"));
    }
}
