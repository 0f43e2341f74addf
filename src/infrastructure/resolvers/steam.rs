use async_trait::async_trait;
use tracing::debug;
use url::Url;

use super::dto::SteamAppDetails;
use super::fetch_json;
use crate::application::services::RequestCache;
use crate::domain::entities::{ContentFamily, ContentTarget, ResolvedContent};
use crate::domain::errors::ResolveError;
use crate::domain::ports::ContentResolver;

const FAMILY: ContentFamily = ContentFamily::Steam;
const APP_DETAILS_API: &str = "https://store.steampowered.com/api/appdetails";

/// Store apps through `appdetails`. Other Steam pages are web pages.
pub struct SteamResolver {
    cache: RequestCache,
}

impl SteamResolver {
    /// Creates a resolver querying the store API through `cache`.
    #[must_use]
    pub const fn new(cache: RequestCache) -> Self {
        Self { cache }
    }

    fn details_url(app_id: u64) -> Result<Url, ResolveError> {
        Url::parse_with_params(APP_DETAILS_API, [("appids", app_id.to_string())])
            .map_err(|e| ResolveError::payload(FAMILY, e.to_string()))
    }
}

#[async_trait]
impl ContentResolver for SteamResolver {
    fn family(&self) -> ContentFamily {
        FAMILY
    }

    async fn resolve(
        &self,
        url: &Url,
        target: &ContentTarget,
    ) -> Result<ResolvedContent, ResolveError> {
        let ContentTarget::SteamApp { app_id } = target else {
            return Err(ResolveError::declined(FAMILY, "not a store app"));
        };
        debug!(url = %url, app_id, "Resolving Steam app");

        let mut details: SteamAppDetails =
            fetch_json(&self.cache, FAMILY, Self::details_url(*app_id)?).await?;
        let app = details
            .remove(&app_id.to_string())
            .filter(|entry| entry.success)
            .and_then(|entry| entry.data)
            .filter(|app| !app.name.is_empty())
            .ok_or(ResolveError::EmptyResult { family: FAMILY })?;

        let price = if app.is_free {
            Some("F2P".to_string())
        } else {
            app.price_overview.map(|price| price.final_formatted)
        };
        let mut content = ResolvedContent::new(target, url.clone(), app.name)
            .with_description(app.short_description)
            .with_thumbnail(app.header_image);
        if let Some(price) = price {
            content = content.with_stat("price", price);
        }
        Ok(content)
    }
}
