//! Finds the live feed container, observes it, and re-acquires it when the
//! host page replaces it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::domain::dom::{Document, MutationObserver, MutationRecord, NodeId, ObserveOptions, Selector};
use crate::domain::entities::FeedContainer;

/// Timing and selectors used to locate the container.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Probed first, in order.
    pub primary: Vec<Selector>,
    /// Probed when no primary selector matches, in order.
    pub fallback: Vec<Selector>,
    /// Delay between search probes.
    pub retry_interval: Duration,
    /// Probes before giving up.
    pub max_retries: u32,
    /// How often an attached container is checked for liveness.
    pub liveness_interval: Duration,
}

impl MonitorConfig {
    /// Creates a config with the default timings.
    #[must_use]
    pub fn new(primary: Vec<Selector>, fallback: Vec<Selector>) -> Self {
        Self {
            primary,
            fallback,
            retry_interval: Duration::from_secs(1),
            max_retries: 10,
            liveness_interval: Duration::from_secs(2),
        }
    }
}

/// Monitor state, published through a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Probing selectors. `attempt` counts probes made so far.
    Searching {
        /// Probes made so far in this search.
        attempt: u32,
    },
    /// Observing a container.
    Attached {
        /// The observed container.
        container: NodeId,
    },
    /// The container went away; a new search starts immediately.
    Lost,
    /// The search gave up. Waits for a rescan.
    NotFound,
}

/// Commands accepted by a running monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorCommand {
    /// The given container was seen removed; search again if it is still the current one.
    Reacquire {
        /// Container the sender saw removed.
        container: NodeId,
    },
    /// Restart the search, also after `NotFound`.
    Rescan,
    /// Stop the monitor.
    Shutdown,
}

/// Events emitted to the ingestion pipeline.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// A container was attached.
    Attached {
        /// The container.
        container: FeedContainer,
        /// False when the same node was attached again.
        is_new: bool,
    },
    /// Mutations observed under the container.
    Batch {
        /// Container the batch belongs to.
        container: FeedContainer,
        /// Records in arrival order.
        records: Vec<MutationRecord>,
    },
    /// The attached container went away.
    Lost {
        /// Id of the lost container.
        container: NodeId,
    },
    /// The search gave up.
    NotFound,
}

/// Called once each time a different container is attached.
pub type ReadyHook = Arc<dyn Fn(&FeedContainer) + Send + Sync>;

/// Control handle for a running monitor.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    commands: mpsc::UnboundedSender<MonitorCommand>,
    state: watch::Receiver<MonitorState>,
}

impl MonitorHandle {
    /// Asks the monitor to search again if `container` is still current.
    pub fn reacquire(&self, container: NodeId) {
        let _ = self.commands.send(MonitorCommand::Reacquire { container });
    }

    /// Restarts the search.
    pub fn rescan(&self) {
        let _ = self.commands.send(MonitorCommand::Rescan);
    }

    /// Stops the monitor.
    pub fn shutdown(&self) {
        let _ = self.commands.send(MonitorCommand::Shutdown);
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }

    /// Waits until the state satisfies `predicate`. Returns `None` once the monitor stopped.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&MonitorState) -> bool,
    ) -> Option<MonitorState> {
        self.state.wait_for(predicate).await.ok().map(|state| *state)
    }
}

enum SearchWake {
    Retry,
    Rescan,
    Stop,
}

enum AttachExit {
    Lost,
    Stop,
}

enum AttachedWake {
    Batch(Option<Vec<MutationRecord>>),
    Liveness,
    Command(Option<MonitorCommand>),
}

/// State machine over `Searching`, `Attached`, `Lost` and `NotFound`.
pub struct ContainerMonitor {
    document: Document,
    config: MonitorConfig,
    events: mpsc::UnboundedSender<FeedEvent>,
    commands: mpsc::UnboundedReceiver<MonitorCommand>,
    state: watch::Sender<MonitorState>,
    ready_hook: Option<ReadyHook>,
    last_container: Option<NodeId>,
}

impl ContainerMonitor {
    /// Creates a monitor, its control handle and the event stream.
    #[must_use]
    pub fn new(
        document: Document,
        config: MonitorConfig,
    ) -> (Self, MonitorHandle, mpsc::UnboundedReceiver<FeedEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(MonitorState::Searching { attempt: 0 });

        let monitor = Self {
            document,
            config,
            events: events_tx,
            commands: commands_rx,
            state: state_tx,
            ready_hook: None,
            last_container: None,
        };
        let handle = MonitorHandle {
            commands: commands_tx,
            state: state_rx,
        };
        (monitor, handle, events_rx)
    }

    /// Sets the hook run when a different container is attached.
    #[must_use]
    pub fn with_ready_hook(mut self, hook: ReadyHook) -> Self {
        self.ready_hook = Some(hook);
        self
    }

    /// Probes primary selectors, then fallback selectors. First match wins.
    #[must_use]
    pub fn find_container(&self) -> Option<FeedContainer> {
        self.config
            .primary
            .iter()
            .chain(&self.config.fallback)
            .find_map(|selector| {
                self.document
                    .query_selector(selector)
                    .filter(|node| node.is_connected())
                    .map(|node| FeedContainer::new(&node, selector.as_str()))
            })
    }

    /// Runs until shut down or until the event receiver is dropped.
    pub async fn run(mut self) {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.set_state(MonitorState::Searching { attempt });

            if let Some(container) = self.find_container() {
                match self.attach(container).await {
                    AttachExit::Lost => {
                        attempt = 0;
                        continue;
                    }
                    AttachExit::Stop => break,
                }
            }

            if attempt >= self.config.max_retries {
                warn!(
                    attempts = attempt,
                    "Feed container not found, waiting for a rescan"
                );
                self.set_state(MonitorState::NotFound);
                if self.events.send(FeedEvent::NotFound).is_err() {
                    break;
                }
                match self.wait_for_rescan().await {
                    SearchWake::Rescan => attempt = 0,
                    SearchWake::Retry | SearchWake::Stop => break,
                }
                continue;
            }

            debug!(attempt, "Feed container not found yet");
            match self.wait_between_probes().await {
                SearchWake::Retry => {}
                SearchWake::Rescan => attempt = 0,
                SearchWake::Stop => break,
            }
        }
        debug!("Container monitor stopped");
    }

    async fn wait_between_probes(&mut self) -> SearchWake {
        let deadline = Instant::now() + self.config.retry_interval;
        loop {
            tokio::select! {
                () = tokio::time::sleep_until(deadline) => return SearchWake::Retry,
                command = self.commands.recv() => match command {
                    Some(MonitorCommand::Rescan) => return SearchWake::Rescan,
                    Some(MonitorCommand::Reacquire { .. }) => {}
                    Some(MonitorCommand::Shutdown) | None => return SearchWake::Stop,
                },
            }
        }
    }

    async fn wait_for_rescan(&mut self) -> SearchWake {
        loop {
            match self.commands.recv().await {
                Some(MonitorCommand::Rescan) => return SearchWake::Rescan,
                Some(MonitorCommand::Reacquire { .. }) => {}
                Some(MonitorCommand::Shutdown) | None => return SearchWake::Stop,
            }
        }
    }

    async fn attach(&mut self, container: FeedContainer) -> AttachExit {
        let Some(node) = container.node() else {
            return AttachExit::Lost;
        };
        let id = container.id();
        let is_new = self.last_container != Some(id);
        self.last_container = Some(id);

        let mut observer = self
            .document
            .observe(&node, ObserveOptions::CHILD_LIST | ObserveOptions::SUBTREE);
        drop(node);

        info!(container = %id, selector = container.selector(), is_new, "Feed container attached");
        self.set_state(MonitorState::Attached { container: id });
        if is_new && let Some(hook) = &self.ready_hook {
            hook(&container);
        }
        if self
            .events
            .send(FeedEvent::Attached {
                container: container.clone(),
                is_new,
            })
            .is_err()
        {
            return AttachExit::Stop;
        }

        let exit = self.watch_container(&container, &mut observer).await;
        observer.disconnect();
        if matches!(exit, AttachExit::Lost) {
            info!(container = %id, "Feed container lost, searching again");
            self.set_state(MonitorState::Lost);
            if self.events.send(FeedEvent::Lost { container: id }).is_err() {
                return AttachExit::Stop;
            }
        }
        exit
    }

    async fn watch_container(
        &mut self,
        container: &FeedContainer,
        observer: &mut MutationObserver,
    ) -> AttachExit {
        let period = self.config.liveness_interval;
        let mut liveness = tokio::time::interval_at(Instant::now() + period, period);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let wake = tokio::select! {
                batch = observer.next_batch() => AttachedWake::Batch(batch),
                _ = liveness.tick() => AttachedWake::Liveness,
                command = self.commands.recv() => AttachedWake::Command(command),
            };

            match wake {
                AttachedWake::Batch(None) => return AttachExit::Lost,
                AttachedWake::Batch(Some(records)) => {
                    let removed = records.iter().any(|r| r.removes(container.id()));
                    let event = FeedEvent::Batch {
                        container: container.clone(),
                        records,
                    };
                    if self.events.send(event).is_err() {
                        return AttachExit::Stop;
                    }
                    if removed {
                        return AttachExit::Lost;
                    }
                }
                AttachedWake::Liveness => {
                    if !container.is_alive() {
                        debug!(container = %container.id(), "Liveness check failed");
                        return AttachExit::Lost;
                    }
                }
                AttachedWake::Command(Some(MonitorCommand::Reacquire { container: id })) => {
                    if id == container.id() {
                        return AttachExit::Lost;
                    }
                    debug!(stale = %id, "Ignoring reacquire for a previous container");
                }
                AttachedWake::Command(Some(MonitorCommand::Rescan)) => return AttachExit::Lost,
                AttachedWake::Command(Some(MonitorCommand::Shutdown) | None) => {
                    return AttachExit::Stop;
                }
            }
        }
    }

    fn set_state(&self, state: MonitorState) {
        self.state.send_replace(state);
    }
}
