//! Drives each link from anchor to placeholder to embed or plain link.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use url::Url;

use super::content_registry::{ContentRegistry, Route, route};
use super::node_marks::NodeMarks;
use crate::domain::dom::{Document, Node, NodeId, NodeRef};
use crate::domain::entities::{
    ContentFamily, EmbedRecord, EmbedSettings, LinkCandidate, LinkState, ResolvedContent,
};
use crate::domain::errors::EmbedError;
use crate::domain::ports::{EMBED_TYPE_ATTR, EmbedRenderer, ORIGINAL_URL_ATTR};

/// Default delay between two links of one batch.
pub const DEFAULT_PACING: Duration = Duration::from_millis(50);

/// Observable transitions, for hosts that want to display them.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum LifecycleEvent {
    /// A placeholder replaced the anchor.
    Placeholder { url: Url },
    /// An embed was committed.
    Embedded {
        url: Url,
        family: ContentFamily,
        node: NodeRef,
    },
    /// A plain link was committed.
    Fallback { url: Url, node: NodeRef },
    /// The target left the document; the work was dropped.
    Discarded { url: Url },
}

/// What regeneration does with one embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegenerationDecision {
    /// Same family under the current settings.
    Keep,
    /// Declined under the current settings.
    Demote,
    /// Routes to another family now.
    ReResolve,
}

/// Decides the fate of `record` under `settings`. Pure.
#[must_use]
pub fn regeneration_decision(
    record: &EmbedRecord,
    settings: &EmbedSettings,
) -> RegenerationDecision {
    match route(&record.url, settings) {
        Route::Declined(_) => RegenerationDecision::Demote,
        Route::Resolve(target) if target.family() == record.family => RegenerationDecision::Keep,
        Route::Resolve(_) => RegenerationDecision::ReResolve,
    }
}

/// Counts from one `regenerate_all` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegenerationReport {
    /// Left untouched.
    pub kept: usize,
    /// Turned into plain links.
    pub demoted: usize,
    /// Resolved again through a placeholder.
    pub re_resolved: usize,
    /// Records whose node had already left the document.
    pub forgotten: usize,
}

impl fmt::Display for RegenerationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} kept, {} demoted, {} re-resolved, {} forgotten",
            self.kept, self.demoted, self.re_resolved, self.forgotten
        )
    }
}

/// Index size below which records of removed embeds are kept.
const MIN_PRUNE_AT: usize = 64;

/// Live embeds by node id; records of removed embeds are dropped whenever
/// the index doubles.
struct EmbedIndex {
    records: BTreeMap<NodeId, EmbedRecord>,
    prune_at: usize,
}

impl EmbedIndex {
    const fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            prune_at: MIN_PRUNE_AT,
        }
    }

    fn insert(&mut self, id: NodeId, record: EmbedRecord) {
        if self.records.len() >= self.prune_at {
            self.prune();
            self.prune_at = (self.records.len() * 2).max(MIN_PRUNE_AT);
        }
        self.records.insert(id, record);
    }

    fn prune(&mut self) {
        self.records.retain(|_, record| record.live_node().is_some());
    }
}

/// Owns every node this crate inserts for links.
pub struct EmbedController {
    document: Document,
    registry: ContentRegistry,
    renderer: Arc<dyn EmbedRenderer>,
    pacing: Duration,
    handled: NodeMarks,
    embeds: Mutex<EmbedIndex>,
    events: Option<mpsc::UnboundedSender<LifecycleEvent>>,
}

impl EmbedController {
    /// Creates a controller writing into `document`.
    #[must_use]
    pub fn new(
        document: Document,
        registry: ContentRegistry,
        renderer: Arc<dyn EmbedRenderer>,
    ) -> Self {
        Self {
            document,
            registry,
            renderer,
            pacing: DEFAULT_PACING,
            handled: NodeMarks::new(),
            embeds: Mutex::new(EmbedIndex::new()),
            events: None,
        }
    }

    /// Sets the delay between links of one batch.
    #[must_use]
    pub const fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Streams lifecycle events to `sender`.
    #[must_use]
    pub fn with_events(mut self, sender: mpsc::UnboundedSender<LifecycleEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Document the controller writes into.
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }

    /// Renderer used for every inserted node.
    #[must_use]
    pub fn renderer(&self) -> &Arc<dyn EmbedRenderer> {
        &self.renderer
    }

    /// Returns true if `node` is an anchor being processed or a node this controller inserted.
    #[must_use]
    pub fn is_handled(&self, node: &Node) -> bool {
        self.handled.is_marked(node)
    }

    /// Number of embeds still in the document.
    #[must_use]
    pub fn embed_count(&self) -> usize {
        let mut embeds = self.embeds.lock();
        embeds.prune();
        embeds.records.len()
    }

    /// Processes `links` one at a time, paced, and returns them in their final states.
    pub async fn process_links(
        &self,
        links: Vec<LinkCandidate>,
        settings: &EmbedSettings,
    ) -> Vec<LinkCandidate> {
        let total = links.len();
        let mut processed = Vec::with_capacity(total);
        for (index, mut link) in links.into_iter().enumerate() {
            self.process_link(&mut link, settings).await;
            processed.push(link);
            if index + 1 < total {
                tokio::time::sleep(self.pacing).await;
            }
        }
        processed
    }

    /// Drives one candidate to a final state. Never fails.
    pub async fn process_link(&self, link: &mut LinkCandidate, settings: &EmbedSettings) {
        let Some(anchor) = link.anchor() else {
            trace!(url = %link.url(), "Anchor dropped before processing");
            return;
        };
        if !anchor.is_connected() {
            trace!(url = %link.url(), "Anchor detached before processing");
            return;
        }
        if !self.handled.mark(&anchor) {
            trace!(url = %link.url(), anchor = %anchor.id(), "Anchor already being processed");
            return;
        }

        let url = link.url().clone();
        let placeholder = self.renderer.placeholder(&self.document, &url);
        self.handled.mark(&placeholder);
        if !anchor.replace_with(placeholder.clone()) {
            self.emit(LifecycleEvent::Discarded { url });
            return;
        }
        link.set_state(LinkState::Placeholder);
        self.emit(LifecycleEvent::Placeholder { url: url.clone() });

        if let Some(state) = self.settle(&placeholder, &url, settings).await {
            link.set_state(state);
        }
    }

    /// Resolves `url` and commits the outcome over `placeholder`.
    ///
    /// Returns `None` when the placeholder left the document meanwhile.
    async fn settle(
        &self,
        placeholder: &NodeRef,
        url: &Url,
        settings: &EmbedSettings,
    ) -> Option<LinkState> {
        let committed = match self.registry.resolve(url, settings).await {
            Ok(Some(content)) => self
                .commit_embed(placeholder, url, &content, settings)
                .map(|_| LinkState::Resolved(content.family)),
            Ok(None) => self.commit_fallback(placeholder, url).map(|_| LinkState::Fallback),
            Err(err) => {
                if err.is_benign() {
                    debug!(url = %url, error = %err, "Link degraded to plain link");
                } else {
                    warn!(url = %url, error = %err, "Link resolution failed");
                }
                self.commit_fallback(placeholder, url).map(|_| LinkState::Fallback)
            }
        };

        match committed {
            Ok(state) => Some(state),
            Err(EmbedError::StaleTarget { node }) => {
                debug!(url = %url, %node, "Placeholder left the document, result discarded");
                self.emit(LifecycleEvent::Discarded { url: url.clone() });
                None
            }
        }
    }

    fn commit_embed(
        &self,
        placeholder: &NodeRef,
        url: &Url,
        content: &ResolvedContent,
        settings: &EmbedSettings,
    ) -> Result<NodeRef, EmbedError> {
        ensure_connected(placeholder)?;

        let embed = self
            .renderer
            .embed(&self.document, content, &settings.presentation);
        embed.set_attribute(ORIGINAL_URL_ATTR, url.as_str());
        embed.set_attribute(EMBED_TYPE_ATTR, content.family.tag());
        self.swap(placeholder, &embed)?;

        self.embeds.lock().insert(
            embed.id(),
            EmbedRecord::new(url.clone(), content.family, &embed),
        );
        debug!(url = %url, family = %content.family, node = %embed.id(), "Embed committed");
        self.emit(LifecycleEvent::Embedded {
            url: url.clone(),
            family: content.family,
            node: embed.clone(),
        });
        Ok(embed)
    }

    fn commit_fallback(&self, target: &NodeRef, url: &Url) -> Result<NodeRef, EmbedError> {
        ensure_connected(target)?;

        let link = self.renderer.plain_link(&self.document, url);
        self.swap(target, &link)?;
        self.emit(LifecycleEvent::Fallback {
            url: url.clone(),
            node: link.clone(),
        });
        Ok(link)
    }

    fn swap(&self, old: &NodeRef, new: &NodeRef) -> Result<(), EmbedError> {
        self.handled.mark(new);
        if old.replace_with(new.clone()) {
            Ok(())
        } else {
            Err(EmbedError::StaleTarget { node: old.id() })
        }
    }

    /// Re-evaluates every live embed under `settings`.
    pub async fn regenerate_all(&self, settings: &EmbedSettings) -> RegenerationReport {
        let records: Vec<(NodeId, EmbedRecord)> = self
            .embeds
            .lock()
            .records
            .iter()
            .map(|(id, record)| (*id, record.clone()))
            .collect();

        let total = records.len();
        let mut report = RegenerationReport::default();
        for (index, (id, record)) in records.into_iter().enumerate() {
            let Some(node) = record.live_node() else {
                self.embeds.lock().records.remove(&id);
                report.forgotten += 1;
                continue;
            };

            match regeneration_decision(&record, settings) {
                RegenerationDecision::Keep => {
                    report.kept += 1;
                    continue;
                }
                RegenerationDecision::Demote => {
                    self.embeds.lock().records.remove(&id);
                    if self.commit_fallback(&node, &record.url).is_ok() {
                        debug!(url = %record.url, family = %record.family, "Embed demoted");
                        report.demoted += 1;
                    }
                }
                RegenerationDecision::ReResolve => {
                    self.embeds.lock().records.remove(&id);
                    let placeholder = self.renderer.placeholder(&self.document, &record.url);
                    if self.swap(&node, &placeholder).is_ok() {
                        self.settle(&placeholder, &record.url, settings).await;
                        report.re_resolved += 1;
                    }
                }
            }
            if index + 1 < total {
                tokio::time::sleep(self.pacing).await;
            }
        }

        info!(%report, "Regeneration finished");
        report
    }

    /// Re-applies presentation to every live embed. Returns how many were touched.
    pub fn refresh_presentation(&self, settings: &EmbedSettings) -> usize {
        let nodes: Vec<NodeRef> = {
            let mut embeds = self.embeds.lock();
            embeds.prune();
            embeds.records.values().filter_map(EmbedRecord::live_node).collect()
        };
        for node in &nodes {
            self.renderer.apply_presentation(node, &settings.presentation);
        }
        debug!(count = nodes.len(), "Presentation refreshed");
        nodes.len()
    }

    fn emit(&self, event: LifecycleEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

fn ensure_connected(node: &NodeRef) -> Result<(), EmbedError> {
    if node.is_connected() {
        Ok(())
    } else {
        Err(EmbedError::StaleTarget { node: node.id() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::content_registry::ResolverSet;
    use crate::domain::entities::ContentTarget;
    use crate::domain::entities::Presentation;
    use crate::domain::errors::ResolveError;
    use crate::domain::ports::ContentResolver;
    use crate::domain::ports::mocks::MockContentResolver;

    struct StubRenderer;

    impl EmbedRenderer for StubRenderer {
        fn placeholder(&self, doc: &Document, _url: &Url) -> NodeRef {
            doc.element("div").class("placeholder").build()
        }

        fn embed(
            &self,
            doc: &Document,
            content: &ResolvedContent,
            presentation: &Presentation,
        ) -> NodeRef {
            doc.element("div")
                .class("coven-embed")
                .attr("data-width", presentation.max_image_width.to_string())
                .text(content.title.clone())
                .build()
        }

        fn plain_link(&self, doc: &Document, url: &Url) -> NodeRef {
            doc.element("a").attr("href", url.as_str()).text(url.as_str()).build()
        }

        fn apply_presentation(&self, embed: &NodeRef, presentation: &Presentation) {
            embed.set_attribute("data-width", presentation.max_image_width.to_string());
        }

        fn banner(&self, doc: &Document) -> NodeRef {
            doc.element("div").build()
        }
    }

    fn titled(title: &'static str) -> MockContentResolver {
        let mut mock = MockContentResolver::new();
        mock.expect_resolve()
            .returning(move |url, target| Ok(ResolvedContent::new(target, url.clone(), title)));
        mock
    }

    fn controller(resolver: MockContentResolver) -> EmbedController {
        let resolver: Arc<dyn ContentResolver> = Arc::new(resolver);
        EmbedController::new(
            Document::new(),
            ContentRegistry::new(ResolverSet::new(resolver)),
            Arc::new(StubRenderer),
        )
    }

    fn message_with_link(doc: &Document, href: &str) -> (NodeRef, LinkCandidate) {
        let anchor = doc.element("a").attr("href", href).build();
        let message = doc.element("div").class("msg").child(anchor.clone()).build();
        doc.body().append_child(message.clone());
        let link = LinkCandidate::new(Url::parse(href).unwrap(), &anchor, &message);
        (message, link)
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_resolves_in_place() {
        let ctl = controller(titled("A video"));
        let (message, mut link) = message_with_link(ctl.document(), "https://youtu.be/abc123");

        ctl.process_link(&mut link, &EmbedSettings::default()).await;

        assert_eq!(link.state(), LinkState::Resolved(ContentFamily::YouTube));
        let embed = message.first_child().unwrap();
        assert_eq!(embed.text(), "A video");
        assert_eq!(
            embed.attribute(ORIGINAL_URL_ATTR).as_deref(),
            Some("https://youtu.be/abc123")
        );
        assert_eq!(embed.attribute(EMBED_TYPE_ATTR).as_deref(), Some("youtube"));
        assert_eq!(ctl.embed_count(), 1);
        assert!(ctl.is_handled(&embed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_degrades_to_plain_link() {
        let mut failing = MockContentResolver::new();
        failing.expect_resolve().returning(|_, _| {
            Err(ResolveError::EmptyResult {
                family: ContentFamily::Discord,
            })
        });
        let ctl = controller(failing);
        let (message, mut link) = message_with_link(ctl.document(), "https://discord.gg/xyz");

        ctl.process_link(&mut link, &EmbedSettings::default()).await;

        assert_eq!(link.state(), LinkState::Fallback);
        let plain = message.first_child().unwrap();
        assert_eq!(plain.tag(), "a");
        assert_eq!(plain.attribute("href").as_deref(), Some("https://discord.gg/xyz"));
        assert_eq!(ctl.embed_count(), 0);
    }

    struct SlowResolver;

    #[async_trait::async_trait]
    impl ContentResolver for SlowResolver {
        fn family(&self) -> ContentFamily {
            ContentFamily::Generic
        }

        async fn resolve(
            &self,
            url: &Url,
            target: &ContentTarget,
        ) -> Result<ResolvedContent, ResolveError> {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(ResolvedContent::new(target, url.clone(), "late"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_placeholder_gets_no_replacement() {
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let ctl = Arc::new(
            EmbedController::new(
                Document::new(),
                ContentRegistry::new(ResolverSet::new(Arc::new(SlowResolver))),
                Arc::new(StubRenderer),
            )
            .with_events(events_tx),
        );
        let (message, mut link) = message_with_link(ctl.document(), "https://example.com/page");

        let task = {
            let ctl = Arc::clone(&ctl);
            tokio::spawn(async move {
                ctl.process_link(&mut link, &EmbedSettings::default()).await;
                link
            })
        };
        assert!(matches!(
            events.recv().await,
            Some(LifecycleEvent::Placeholder { .. })
        ));
        message.remove();
        let link = task.await.unwrap();

        assert_eq!(link.state(), LinkState::Placeholder);
        assert!(matches!(
            events.recv().await,
            Some(LifecycleEvent::Discarded { .. })
        ));
        let children = message.children();
        assert_eq!(children.len(), 1);
        assert!(children[0].has_class("placeholder"));
        assert_eq!(ctl.embed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_refuses_detached_placeholder() {
        let ctl = controller(titled("unused"));
        let doc = ctl.document().clone();
        let placeholder = doc.element("div").build();
        let url = Url::parse("https://youtu.be/abc").unwrap();

        let state = ctl
            .settle(&placeholder, &url, &EmbedSettings::default())
            .await;

        assert_eq!(state, None);
        assert!(placeholder.parent().is_none());
        assert_eq!(ctl.embed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_anchor_processed_once() {
        let mut once = MockContentResolver::new();
        once.expect_resolve()
            .times(1)
            .returning(|url, target| Ok(ResolvedContent::new(target, url.clone(), "x")));
        let ctl = controller(once);
        let (_message, link) = message_with_link(ctl.document(), "https://youtu.be/abc");
        let mut twin = link.clone();
        let mut link = link;

        ctl.process_link(&mut link, &EmbedSettings::default()).await;
        ctl.process_link(&mut twin, &EmbedSettings::default()).await;

        assert_eq!(twin.state(), LinkState::Unprocessed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_links_are_paced() {
        let ctl = controller(titled("t")).with_pacing(Duration::from_millis(50));
        let links: Vec<_> = (0..3)
            .map(|i| message_with_link(ctl.document(), &format!("https://youtu.be/v{i}")).1)
            .collect();

        let started = tokio::time::Instant::now();
        let done = ctl.process_links(links, &EmbedSettings::default()).await;

        assert_eq!(started.elapsed(), Duration::from_millis(100));
        assert!(done.iter().all(|link| link.state().is_terminal()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_regeneration_demotes_disabled_family() {
        let ctl = controller(titled("t"));
        let (twitch_msg, mut twitch) =
            message_with_link(ctl.document(), "https://www.twitch.tv/somebody");
        let (youtube_msg, mut youtube) = message_with_link(ctl.document(), "https://youtu.be/abc");
        let mut settings = EmbedSettings::default();
        ctl.process_link(&mut twitch, &settings).await;
        ctl.process_link(&mut youtube, &settings).await;
        let youtube_embed = youtube_msg.first_child().unwrap();

        settings.features.twitch = false;
        let report = ctl.regenerate_all(&settings).await;

        assert_eq!(report.demoted, 1);
        assert_eq!(report.kept, 1);
        let plain = twitch_msg.first_child().unwrap();
        assert_eq!(plain.tag(), "a");
        assert_eq!(plain.attribute("href").as_deref(), Some("https://www.twitch.tv/somebody"));
        assert!(Arc::ptr_eq(&youtube_msg.first_child().unwrap(), &youtube_embed));
        assert_eq!(ctl.embed_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_regeneration_paces_between_embeds_only() {
        let ctl = controller(titled("t"));
        let mut settings = EmbedSettings::default();
        for channel in ["one", "two"] {
            let (_message, mut link) =
                message_with_link(ctl.document(), &format!("https://www.twitch.tv/{channel}"));
            ctl.process_link(&mut link, &settings).await;
        }

        settings.features.twitch = false;
        let started = tokio::time::Instant::now();
        let report = ctl.regenerate_all(&settings).await;

        assert_eq!(report.demoted, 2);
        assert_eq!(started.elapsed(), DEFAULT_PACING);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_embeds_leave_the_index() {
        let ctl = controller(titled("t"));
        let settings = EmbedSettings::default();
        for i in 0..MIN_PRUNE_AT {
            let (message, mut link) =
                message_with_link(ctl.document(), &format!("https://youtu.be/v{i}"));
            ctl.process_link(&mut link, &settings).await;
            message.remove();
        }
        assert_eq!(ctl.embeds.lock().records.len(), MIN_PRUNE_AT);

        let (_message, mut link) = message_with_link(ctl.document(), "https://youtu.be/last");
        ctl.process_link(&mut link, &settings).await;

        assert_eq!(ctl.embeds.lock().records.len(), 1);
        assert_eq!(ctl.embed_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_regeneration_re_resolves_when_family_changes() {
        let ctl = controller(titled("img"));
        let (message, mut link) = message_with_link(ctl.document(), "https://example.com/cat.png");
        let mut settings = EmbedSettings::default();
        settings.features.images = false;
        ctl.process_link(&mut link, &settings).await;
        assert_eq!(link.state(), LinkState::Resolved(ContentFamily::Generic));

        settings.features.images = true;
        let report = ctl.regenerate_all(&settings).await;

        assert_eq!(report.re_resolved, 1);
        let embed = message.first_child().unwrap();
        assert_eq!(embed.attribute(EMBED_TYPE_ATTR).as_deref(), Some("image"));
        assert_eq!(ctl.embed_count(), 1);
    }

    #[test]
    fn test_regeneration_decision() {
        let doc = Document::new();
        let node = doc.create_element("div");
        let record = EmbedRecord::new(
            Url::parse("https://clips.twitch.tv/Slug").unwrap(),
            ContentFamily::Twitch,
            &node,
        );
        let mut settings = EmbedSettings::default();

        assert_eq!(regeneration_decision(&record, &settings), RegenerationDecision::Keep);
        settings.features.twitch = false;
        assert_eq!(regeneration_decision(&record, &settings), RegenerationDecision::Demote);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_presentation_touches_live_embeds_only() {
        let ctl = controller(titled("t"));
        let (kept, mut a) = message_with_link(ctl.document(), "https://youtu.be/a");
        let (gone, mut b) = message_with_link(ctl.document(), "https://youtu.be/b");
        let mut settings = EmbedSettings::default();
        ctl.process_link(&mut a, &settings).await;
        ctl.process_link(&mut b, &settings).await;
        gone.remove();

        settings.presentation.max_image_width = 640;
        assert_eq!(ctl.refresh_presentation(&settings), 1);
        assert_eq!(
            kept.first_child().unwrap().attribute("data-width").as_deref(),
            Some("640")
        );
    }
}
