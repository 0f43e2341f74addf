//! Turns container mutation batches into ordered link sequences.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, trace};
use url::Url;

use super::container_monitor::{FeedEvent, MonitorHandle};
use super::embed_lifecycle::EmbedController;
use super::node_marks::NodeMarks;
use crate::domain::dom::{MutationRecord, NodeRef, Selector};
use crate::domain::entities::{EmbedSettings, FeedContainer, LinkCandidate};

/// Selectors and timing of the pipeline.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Matches one chat message.
    pub message: Selector,
    /// Matches candidate anchors inside a message.
    pub link: Selector,
    /// Delay between attachment and the sweep of pre-existing messages.
    pub initial_sweep_delay: Duration,
}

impl IngestionConfig {
    /// Creates a config with the default sweep delay.
    #[must_use]
    pub const fn new(message: Selector, link: Selector) -> Self {
        Self {
            message,
            link,
            initial_sweep_delay: Duration::from_secs(1),
        }
    }
}

/// Message scanning shared by the event loop and the sweep tasks.
pub struct MessageScanner {
    config: IngestionConfig,
    scanned: NodeMarks,
    controller: Arc<EmbedController>,
}

impl MessageScanner {
    /// Creates a scanner that skips anchors `controller` already handles.
    #[must_use]
    pub fn new(config: IngestionConfig, controller: Arc<EmbedController>) -> Self {
        Self {
            config,
            scanned: NodeMarks::new(),
            controller,
        }
    }

    /// Messages in `added` not scanned before, marked as scanned on return.
    ///
    /// An added node counts if it is a message or contains messages.
    #[must_use]
    pub fn claim_messages(&self, added: &[NodeRef]) -> Vec<NodeRef> {
        let mut claimed = Vec::new();
        for node in added {
            if !node.is_connected() {
                continue;
            }
            let messages = if node.matches(&self.config.message) {
                vec![node.clone()]
            } else {
                node.query_selector_all(&self.config.message)
            };
            claimed.extend(messages.into_iter().filter(|message| self.scanned.mark(message)));
        }
        claimed
    }

    /// Qualifying links of `messages`, in document order.
    #[must_use]
    pub fn extract_links(&self, messages: &[NodeRef]) -> Vec<LinkCandidate> {
        messages
            .iter()
            .flat_map(|message| {
                message
                    .query_selector_all(&self.config.link)
                    .into_iter()
                    .filter_map(move |anchor| self.candidate(&anchor, message))
            })
            .collect()
    }

    fn candidate(&self, anchor: &NodeRef, message: &NodeRef) -> Option<LinkCandidate> {
        if self.controller.is_handled(anchor) {
            return None;
        }
        let href = anchor.attribute("href")?;
        let url = Url::parse(href.trim()).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            trace!(%href, "Skipping non-web link");
            return None;
        }
        Some(LinkCandidate::new(url, anchor, message))
    }

    /// Claims and extracts in one step for a batch of records.
    ///
    /// Stops at the first record removing `container`; returns `None` in that case.
    #[must_use]
    pub fn scan_batch(
        &self,
        container: &FeedContainer,
        records: &[MutationRecord],
    ) -> Option<Vec<LinkCandidate>> {
        let mut messages = Vec::new();
        for record in records {
            if record.removes(container.id()) {
                return None;
            }
            messages.extend(self.claim_messages(&record.added));
        }
        Some(self.extract_links(&messages))
    }

    /// Scans the messages already inside `container`.
    #[must_use]
    pub fn sweep(&self, container: &FeedContainer) -> Vec<LinkCandidate> {
        let Some(node) = container.node() else {
            return Vec::new();
        };
        let messages = self.claim_messages(&node.query_selector_all(&self.config.message));
        debug!(
            container = %container.id(),
            messages = messages.len(),
            "Initial sweep"
        );
        self.extract_links(&messages)
    }

    /// Number of messages scanned and still alive.
    #[must_use]
    pub fn scanned_count(&self) -> usize {
        self.scanned.len()
    }
}

/// Consumes monitor events and feeds the controller.
pub struct IngestionPipeline {
    scanner: Arc<MessageScanner>,
    controller: Arc<EmbedController>,
    monitor: MonitorHandle,
    settings: watch::Receiver<EmbedSettings>,
    tasks: JoinSet<()>,
}

impl IngestionPipeline {
    /// Creates a pipeline reading settings snapshots from `settings`.
    #[must_use]
    pub fn new(
        config: IngestionConfig,
        controller: Arc<EmbedController>,
        monitor: MonitorHandle,
        settings: watch::Receiver<EmbedSettings>,
    ) -> Self {
        Self {
            scanner: Arc::new(MessageScanner::new(config, Arc::clone(&controller))),
            controller,
            monitor,
            settings,
            tasks: JoinSet::new(),
        }
    }

    /// Scanner shared with the sweep tasks.
    #[must_use]
    pub fn scanner(&self) -> &Arc<MessageScanner> {
        &self.scanner
    }

    /// Runs until the event stream closes, then waits for in-flight batches.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<FeedEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event);
            while self.tasks.try_join_next().is_some() {}
        }
        while self.tasks.join_next().await.is_some() {}
        debug!("Ingestion stopped");
    }

    /// Handles one event. Marking happens here, before any task is spawned.
    pub fn handle(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Attached { container, is_new } => {
                info!(
                    container = %container.id(),
                    selector = container.selector(),
                    is_new,
                    "Feed attached"
                );
                self.schedule_sweep(container);
            }
            FeedEvent::Batch { container, records } => {
                match self.scanner.scan_batch(&container, &records) {
                    None => {
                        info!(container = %container.id(), "Container removed, re-searching");
                        self.monitor.reacquire(container.id());
                    }
                    Some(links) => self.dispatch(links),
                }
            }
            FeedEvent::Lost { container } => {
                debug!(%container, "Feed lost");
            }
            FeedEvent::NotFound => {
                debug!("No feed container");
            }
        }
    }

    fn schedule_sweep(&mut self, container: FeedContainer) {
        let scanner = Arc::clone(&self.scanner);
        let controller = Arc::clone(&self.controller);
        let settings = self.settings.clone();
        let delay = scanner.config.initial_sweep_delay;
        self.tasks.spawn(async move {
            tokio::time::sleep(delay).await;
            let links = scanner.sweep(&container);
            if !links.is_empty() {
                let snapshot = *settings.borrow();
                controller.process_links(links, &snapshot).await;
            }
        });
    }

    fn dispatch(&mut self, links: Vec<LinkCandidate>) {
        if links.is_empty() {
            return;
        }
        trace!(count = links.len(), "Dispatching links");
        let controller = Arc::clone(&self.controller);
        let snapshot = *self.settings.borrow();
        self.tasks.spawn(async move {
            controller.process_links(links, &snapshot).await;
        });
    }
}
