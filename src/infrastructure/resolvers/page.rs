//! HTML pages described by their meta tags, and GamesPlanet store pages.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use super::{fetch_html, host_label};
use crate::application::services::RequestCache;
use crate::domain::entities::{ContentFamily, ContentTarget, ResolvedContent};
use crate::domain::errors::ResolveError;
use crate::domain::ports::ContentResolver;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

static TITLE: LazyLock<[Selector; 3]> = LazyLock::new(|| {
    [
        selector(r#"meta[property="og:title"]"#),
        selector(r#"meta[name="twitter:title"]"#),
        selector("title"),
    ]
});

static DESCRIPTION: LazyLock<[Selector; 3]> = LazyLock::new(|| {
    [
        selector(r#"meta[property="og:description"]"#),
        selector(r#"meta[name="twitter:description"]"#),
        selector(r#"meta[name="description"]"#),
    ]
});

static IMAGE: LazyLock<[Selector; 2]> = LazyLock::new(|| {
    [
        selector(r#"meta[property="og:image"]"#),
        selector(r#"meta[name="twitter:image"]"#),
    ]
});

static SITE_NAME: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"meta[property="og:site_name"]"#));

static PRICES: LazyLock<Selector> = LazyLock::new(|| selector(".prices"));

// "59,99€ - 10% 53,99€"
static DISCOUNTED_PRICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([\d,.]+€)\s*-\s*(\d+%)\s*([\d,.]+€)").expect("static regex must compile")
});

/// Metadata read from a page's head.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMeta {
    /// `og:title`, `twitter:title`, then `<title>`.
    pub title: Option<String>,
    /// `og:description`, `twitter:description`, then `description`.
    pub description: Option<String>,
    /// `og:image` or `twitter:image`, absolute.
    pub image: Option<String>,
    /// `og:site_name`, or the host without `www.`.
    pub site_name: String,
}

impl PageMeta {
    /// Reads metadata from `html`, resolving relative image URLs against `url`.
    #[must_use]
    pub fn parse(html: &str, url: &Url) -> Self {
        let document = Html::parse_document(html);
        let image = first_value(&document, &*IMAGE)
            .and_then(|image| url.join(&image).ok())
            .map(String::from);

        Self {
            title: first_value(&document, &*TITLE),
            description: first_value(&document, &*DESCRIPTION),
            image,
            site_name: first_value(&document, std::slice::from_ref(&*SITE_NAME))
                .unwrap_or_else(|| host_label(url)),
        }
    }
}

/// First non-blank value among `selectors`: a meta `content` attribute or an element's text.
fn first_value(document: &Html, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        document.select(selector).find_map(|element| {
            let value = match element.value().attr("content") {
                Some(content) => content.trim().to_string(),
                None if element.value().name() == "meta" => return None,
                None => element.text().collect::<String>().trim().to_string(),
            };
            (!value.is_empty()).then_some(value)
        })
    })
}

/// Ko-fi, Eneba and Steam pages other than apps.
pub struct MetaPageResolver {
    cache: RequestCache,
}

impl MetaPageResolver {
    /// Creates a resolver fetching pages through `cache`.
    #[must_use]
    pub const fn new(cache: RequestCache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl ContentResolver for MetaPageResolver {
    fn family(&self) -> ContentFamily {
        ContentFamily::WebPage
    }

    async fn resolve(
        &self,
        url: &Url,
        target: &ContentTarget,
    ) -> Result<ResolvedContent, ResolveError> {
        if !matches!(target, ContentTarget::WebPage(_) | ContentTarget::SteamPage) {
            return Err(ResolveError::declined(ContentFamily::WebPage, "not a web page"));
        }
        debug!(url = %url, "Reading page metadata");

        let html = fetch_html(&self.cache, ContentFamily::WebPage, url.clone()).await?;
        let meta = PageMeta::parse(&html, url);
        let title = meta.title.ok_or(ResolveError::EmptyResult {
            family: ContentFamily::WebPage,
        })?;

        Ok(ResolvedContent::new(target, url.clone(), title)
            .with_platform(meta.site_name)
            .with_description(meta.description)
            .with_thumbnail(meta.image))
    }
}

/// GamesPlanet store pages, with prices on game pages.
pub struct GamesPlanetResolver {
    cache: RequestCache,
}

impl GamesPlanetResolver {
    /// Creates a resolver fetching store pages through `cache`.
    #[must_use]
    pub const fn new(cache: RequestCache) -> Self {
        Self { cache }
    }

    /// `GamesPlanet`, or `GamesPlanet × Partner` for `?ref=partner` links.
    fn platform_label(url: &Url) -> String {
        let referral = url
            .query_pairs()
            .find(|(key, value)| key == "ref" && !value.is_empty())
            .map(|(_, value)| capitalize(&value));
        match referral {
            Some(referral) => format!("GamesPlanet × {referral}"),
            None => "GamesPlanet".to_string(),
        }
    }

    fn price_stats(html: &str) -> Vec<(&'static str, String)> {
        let document = Html::parse_document(html);
        let Some(prices) = document.select(&PRICES).next() else {
            return Vec::new();
        };
        let text = prices.text().collect::<String>().trim().to_string();
        if text.is_empty() {
            return Vec::new();
        }

        match DISCOUNTED_PRICE.captures(&text) {
            Some(caps) => vec![
                ("price", caps[3].to_string()),
                ("was", caps[1].to_string()),
                ("discount", caps[2].to_string()),
            ],
            None => vec![("price", text)],
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[async_trait]
impl ContentResolver for GamesPlanetResolver {
    fn family(&self) -> ContentFamily {
        ContentFamily::GamesPlanet
    }

    async fn resolve(
        &self,
        url: &Url,
        target: &ContentTarget,
    ) -> Result<ResolvedContent, ResolveError> {
        if *target != ContentTarget::StorePage {
            return Err(ResolveError::declined(ContentFamily::GamesPlanet, "not a store page"));
        }
        debug!(url = %url, "Reading GamesPlanet page");

        let html = fetch_html(&self.cache, ContentFamily::GamesPlanet, url.clone()).await?;
        let meta = PageMeta::parse(&html, url);
        let title = meta.title.ok_or(ResolveError::EmptyResult {
            family: ContentFamily::GamesPlanet,
        })?;

        let mut content = ResolvedContent::new(target, url.clone(), title)
            .with_platform(Self::platform_label(url))
            .with_description(meta.description)
            .with_thumbnail(meta.image);
        if url.path().contains("/game/") {
            for (label, value) in Self::price_stats(&html) {
                content = content.with_stat(label, value);
            }
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::WebSite;
    use crate::domain::ports::TransportResponse;
    use crate::infrastructure::resolvers::testing;
    use test_case::test_case;
    use tokio_test::{assert_err, assert_ok};

    const KOFI_PAGE: &str = r#"<html><head>
        <title>Fallback title</title>
        <meta property="og:title" content="Support Someone on Ko-fi">
        <meta name="description" content="Buy me a coffee">
        <meta name="twitter:image" content="/img/avatar.png">
        </head><body></body></html>"#;

    #[test]
    fn test_meta_fallback_order() {
        let url = Url::parse("https://www.ko-fi.com/someone").unwrap();
        let meta = PageMeta::parse(KOFI_PAGE, &url);

        assert_eq!(meta.title.as_deref(), Some("Support Someone on Ko-fi"));
        assert_eq!(meta.description.as_deref(), Some("Buy me a coffee"));
        assert_eq!(meta.image.as_deref(), Some("https://www.ko-fi.com/img/avatar.png"));
        assert_eq!(meta.site_name, "ko-fi.com");
    }

    #[test]
    fn test_document_title_is_last_resort() {
        let url = Url::parse("https://example.com").unwrap();
        let meta = PageMeta::parse(
            r#"<html><head><meta property="og:title" content=" "><title> Plain </title></head></html>"#,
            &url,
        );

        assert_eq!(meta.title.as_deref(), Some("Plain"));
        assert!(meta.description.is_none());
    }

    #[test_case("https://fr.gamesplanet.com/game/x?ref=thecoven", "GamesPlanet × Thecoven")]
    #[test_case("https://fr.gamesplanet.com/game/x?ref=", "GamesPlanet")]
    #[test_case("https://gamesplanet.com/", "GamesPlanet")]
    fn test_platform_label(url: &str, expected: &str) {
        let url = Url::parse(url).unwrap();
        assert_eq!(GamesPlanetResolver::platform_label(&url), expected);
    }

    #[test_case("<div class='prices'>59,99€ - 10% 53,99€</div>", &[("price", "53,99€"), ("was", "59,99€"), ("discount", "10%")] ; "discounted")]
    #[test_case("<div class='prices'> 19,99€ </div>", &[("price", "19,99€")] ; "raw text")]
    #[test_case("<div></div>", &[] ; "no price")]
    fn test_price_stats(body: &str, expected: &[(&str, &str)]) {
        let stats = GamesPlanetResolver::price_stats(body);
        let stats: Vec<(&str, &str)> = stats.iter().map(|(l, v)| (*l, v.as_str())).collect();
        assert_eq!(stats, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_meta_page_uses_site_name() {
        let (transport, cache) = testing::cache();
        let page = r#"<head><meta property="og:title" content="Deal"><meta property="og:site_name" content="Eneba"></head>"#;
        transport.push(
            "https://www.eneba.com/deal",
            Ok(TransportResponse::new(200, page.to_string())),
        );
        let url = Url::parse("https://www.eneba.com/deal").unwrap();

        let content = assert_ok!(
            MetaPageResolver::new(cache)
                .resolve(&url, &ContentTarget::WebPage(WebSite::Eneba))
                .await
        );

        assert_eq!(content.platform, "Eneba");
        assert_eq!(content.title, "Deal");
        assert_eq!(content.family, ContentFamily::WebPage);
    }

    #[tokio::test(start_paused = true)]
    async fn test_untitled_page_is_empty() {
        let (transport, cache) = testing::cache();
        transport.push(
            "https://store.steampowered.com/news/",
            Ok(TransportResponse::new(200, "<html></html>")),
        );
        let url = Url::parse("https://store.steampowered.com/news/").unwrap();

        let err = assert_err!(
            MetaPageResolver::new(cache)
                .resolve(&url, &ContentTarget::SteamPage)
                .await
        );

        assert!(matches!(err, ResolveError::EmptyResult { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_prices_only_on_game_pages() {
        let (transport, cache) = testing::cache();
        let page = r#"<head><title>Sale</title></head><body><div class="prices">9,99€</div></body>"#;
        transport.push(
            "https://fr.gamesplanet.com/promotions",
            Ok(TransportResponse::new(200, page.to_string())),
        );
        let url = Url::parse("https://fr.gamesplanet.com/promotions").unwrap();

        let content = assert_ok!(
            GamesPlanetResolver::new(cache)
                .resolve(&url, &ContentTarget::StorePage)
                .await
        );

        assert_eq!(content.title, "Sale");
        assert!(content.stats.is_empty());
    }
}
