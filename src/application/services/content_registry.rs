//! Routes URLs to per-family resolvers.

use std::sync::Arc;

use tracing::{debug, trace};
use url::Url;

use super::content_classifier::classify;
use crate::domain::entities::{ContentFamily, ContentTarget, EmbedSettings, ResolvedContent};
use crate::domain::errors::ResolveError;
use crate::domain::ports::ContentResolver;

/// Why a URL was not routed to any resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineReason {
    /// The master switch is off.
    Disabled,
    /// Not an http(s) URL.
    UnsupportedScheme,
    /// The family (or site) switch for the target is off.
    FamilyDisabled(ContentFamily),
}

/// Outcome of routing a URL under some settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// No resolver will be called.
    Declined(DeclineReason),
    /// Resolve through the resolver of the target's family.
    Resolve(ContentTarget),
}

impl Route {
    /// Family the URL routes to, if any.
    #[must_use]
    pub const fn family(&self) -> Option<ContentFamily> {
        match self {
            Self::Declined(_) => None,
            Self::Resolve(target) => Some(target.family()),
        }
    }
}

/// Pure routing step. Performs no I/O.
#[must_use]
pub fn route(url: &Url, settings: &EmbedSettings) -> Route {
    let features = &settings.features;
    if !features.enabled {
        return Route::Declined(DeclineReason::Disabled);
    }
    if !matches!(url.scheme(), "http" | "https") {
        return Route::Declined(DeclineReason::UnsupportedScheme);
    }

    let target = classify(url, features.images);
    if !features.allows(&target) {
        return Route::Declined(DeclineReason::FamilyDisabled(target.family()));
    }
    Route::Resolve(target)
}

/// One resolver per content family.
#[derive(Clone)]
pub struct ResolverSet {
    youtube: Arc<dyn ContentResolver>,
    twitch: Arc<dyn ContentResolver>,
    discord: Arc<dyn ContentResolver>,
    steam: Arc<dyn ContentResolver>,
    gamesplanet: Arc<dyn ContentResolver>,
    web_page: Arc<dyn ContentResolver>,
    image: Arc<dyn ContentResolver>,
    generic: Arc<dyn ContentResolver>,
}

impl ResolverSet {
    /// Creates a set where every slot holds `resolver`.
    #[must_use]
    pub fn new(resolver: Arc<dyn ContentResolver>) -> Self {
        Self {
            youtube: Arc::clone(&resolver),
            twitch: Arc::clone(&resolver),
            discord: Arc::clone(&resolver),
            steam: Arc::clone(&resolver),
            gamesplanet: Arc::clone(&resolver),
            web_page: Arc::clone(&resolver),
            image: Arc::clone(&resolver),
            generic: resolver,
        }
    }

    /// Puts `resolver` in the slot of the family it reports.
    #[must_use]
    pub fn with(mut self, resolver: Arc<dyn ContentResolver>) -> Self {
        let family = resolver.family();
        *self.slot_mut(family) = resolver;
        self
    }

    /// Resolver serving `family`.
    #[must_use]
    pub fn get(&self, family: ContentFamily) -> &Arc<dyn ContentResolver> {
        match family {
            ContentFamily::YouTube => &self.youtube,
            ContentFamily::Twitch => &self.twitch,
            ContentFamily::Discord => &self.discord,
            ContentFamily::Steam => &self.steam,
            ContentFamily::GamesPlanet => &self.gamesplanet,
            ContentFamily::WebPage => &self.web_page,
            ContentFamily::Image => &self.image,
            ContentFamily::Generic => &self.generic,
        }
    }

    fn slot_mut(&mut self, family: ContentFamily) -> &mut Arc<dyn ContentResolver> {
        match family {
            ContentFamily::YouTube => &mut self.youtube,
            ContentFamily::Twitch => &mut self.twitch,
            ContentFamily::Discord => &mut self.discord,
            ContentFamily::Steam => &mut self.steam,
            ContentFamily::GamesPlanet => &mut self.gamesplanet,
            ContentFamily::WebPage => &mut self.web_page,
            ContentFamily::Image => &mut self.image,
            ContentFamily::Generic => &mut self.generic,
        }
    }
}

/// Maps URLs to resolved content.
#[derive(Clone)]
pub struct ContentRegistry {
    resolvers: ResolverSet,
}

impl ContentRegistry {
    /// Creates a registry dispatching to `resolvers`.
    #[must_use]
    pub const fn new(resolvers: ResolverSet) -> Self {
        Self { resolvers }
    }

    /// Resolves `url` under `settings`.
    ///
    /// Returns `Ok(None)` when the URL is declined, either by routing or by the
    /// resolver itself.
    ///
    /// # Errors
    /// Returns the resolver's `ResolveError` for every other failure.
    pub async fn resolve(
        &self,
        url: &Url,
        settings: &EmbedSettings,
    ) -> Result<Option<ResolvedContent>, ResolveError> {
        let target = match route(url, settings) {
            Route::Declined(reason) => {
                debug!(url = %url, ?reason, "Link declined");
                return Ok(None);
            }
            Route::Resolve(target) => target,
        };

        let family = target.family();
        trace!(url = %url, %family, ?target, "Resolving link");
        match self.resolvers.get(family).resolve(url, &target).await {
            Ok(content) => Ok(Some(content)),
            Err(ResolveError::Declined { reason, .. }) => {
                debug!(url = %url, %family, reason = %reason, "Resolver declined link");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}
