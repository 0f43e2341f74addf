//! Line-oriented host: stdin lines become chat messages in an in-process feed.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use url::Url;

use super::commands::{ConsoleCommand, HELP};
use super::renderer::render_text;
use crate::application::services::{
    EmbedController, LifecycleEvent, MonitorHandle, ReadyHook, RequestCache,
};
use crate::domain::dom::{Document, NodeRef};
use crate::domain::entities::{EmbedSettings, FeedContainer, Presentation};
use crate::domain::ports::EmbedRenderer;

/// Class of the container the console mounts.
pub const FEED_CLASS: &str = "chat-list";
/// Class of each message the console posts.
pub const MESSAGE_CLASS: &str = "chat-line__message";

/// Mounts an empty feed container under `body`.
pub fn mount_feed(document: &Document) -> NodeRef {
    let feed = document.element("div").class(FEED_CLASS).build();
    document.body().append_child(feed.clone());
    feed
}

/// Builds a message node; web URLs become anchors, other words text fragments.
#[must_use]
pub fn message_node(document: &Document, text: &str) -> NodeRef {
    let message = document.element("div").class(MESSAGE_CLASS);
    text.split_whitespace()
        .fold(message, |message, word| {
            let fragment = match Url::parse(word) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => document
                    .element("a")
                    .class("link-fragment")
                    .attr("href", word)
                    .text(word)
                    .build(),
                _ => document
                    .element("span")
                    .class("text-fragment")
                    .text(format!("{word} "))
                    .build(),
            };
            message.child(fragment)
        })
        .build()
}

/// Ready hook inserting the renderer's banner at the top of each new
/// container and removing it after `duration`.
pub fn banner_hook(
    renderer: Arc<dyn EmbedRenderer>,
    document: Document,
    duration: Duration,
) -> ReadyHook {
    Arc::new(move |container: &FeedContainer| {
        let Some(node) = container.node() else {
            return;
        };
        let banner = renderer.banner(&document);
        node.insert_before(banner.clone(), node.first_child().as_ref());
        println!("{}", render_text(&banner));

        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            banner.remove();
        });
    })
}

/// What the console does after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Print this text.
    Print(String),
    /// Nothing to print.
    Silent,
    /// Stop reading input.
    Quit,
}

/// Owns the feed container and the settings channel of the running embedder.
pub struct ConsoleHost {
    document: Document,
    controller: Arc<EmbedController>,
    cache: RequestCache,
    monitor: MonitorHandle,
    settings: watch::Sender<EmbedSettings>,
    feed: NodeRef,
}

impl ConsoleHost {
    /// Creates a host posting into `feed`.
    #[must_use]
    pub fn new(
        controller: Arc<EmbedController>,
        cache: RequestCache,
        monitor: MonitorHandle,
        settings: watch::Sender<EmbedSettings>,
        feed: NodeRef,
    ) -> Self {
        Self {
            document: controller.document().clone(),
            controller,
            cache,
            monitor,
            settings,
            feed,
        }
    }

    fn snapshot(&self) -> EmbedSettings {
        *self.settings.borrow()
    }

    fn update_presentation(&self, update: impl FnOnce(&mut Presentation)) -> Reply {
        self.settings.send_modify(|settings| {
            update(&mut settings.presentation);
            settings.presentation = settings.presentation.clamped();
        });
        let settings = self.snapshot();
        let refreshed = self.controller.refresh_presentation(&settings);
        Reply::Print(format!(
            "{} {}x{}, {refreshed} embeds updated",
            settings.presentation.style,
            settings.presentation.max_image_width,
            settings.presentation.max_image_height
        ))
    }

    /// Runs one command.
    pub async fn execute(&mut self, command: ConsoleCommand) -> Reply {
        match command {
            ConsoleCommand::Message(text) if text.is_empty() => Reply::Silent,
            ConsoleCommand::Message(text) => {
                if !self.feed.is_connected() {
                    return Reply::Print("No chat container, try /rerender".to_string());
                }
                self.feed.append_child(message_node(&self.document, &text));
                Reply::Silent
            }
            ConsoleCommand::Regenerate => {
                let report = self.controller.regenerate_all(&self.snapshot()).await;
                Reply::Print(format!("Regenerated: {report}"))
            }
            ConsoleCommand::Refresh => {
                let count = self.controller.refresh_presentation(&self.snapshot());
                Reply::Print(format!("{count} embeds refreshed"))
            }
            ConsoleCommand::Toggle(family) => {
                let mut enabled = false;
                self.settings.send_modify(|settings| {
                    enabled = settings.features.toggle(family);
                });
                let state = if enabled { "on" } else { "off" };
                Reply::Print(format!("{} {state}, /regen to apply", family.display_name()))
            }
            ConsoleCommand::Width(width) => {
                self.update_presentation(|presentation| presentation.max_image_width = width)
            }
            ConsoleCommand::Height(height) => {
                self.update_presentation(|presentation| presentation.max_image_height = height)
            }
            ConsoleCommand::Style(style) => {
                self.update_presentation(|presentation| presentation.style = style)
            }
            ConsoleCommand::Rerender => {
                self.feed.remove();
                self.feed = mount_feed(&self.document);
                self.monitor.rescan();
                Reply::Print("Chat container replaced".to_string())
            }
            ConsoleCommand::Stats => Reply::Print(format!(
                "{}\nEmbeds: {} live\nMonitor: {:?}",
                self.cache.stats(),
                self.controller.embed_count(),
                self.monitor.state()
            )),
            ConsoleCommand::Help => Reply::Print(HELP.to_string()),
            ConsoleCommand::Quit => Reply::Quit,
        }
    }

    /// Reads stdin until EOF or `/quit`, printing lifecycle events as they arrive.
    ///
    /// # Errors
    ///
    /// Returns an error if stdin cannot be read. The monitor is shut down either way.
    pub async fn run(
        self,
        events: mpsc::UnboundedReceiver<LifecycleEvent>,
    ) -> color_eyre::Result<()> {
        println!("Type messages with links, /help for commands");
        self.run_with(BufReader::new(tokio::io::stdin()), events).await
    }

    async fn run_with<R>(
        mut self,
        input: R,
        mut events: mpsc::UnboundedReceiver<LifecycleEvent>,
    ) -> color_eyre::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let result = loop {
            tokio::select! {
                line = lines.next_line() => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        Ok(None) => break Ok(()),
                        Err(err) => {
                            error!(error = %err, "Failed to read console input");
                            break Err(err.into());
                        }
                    };
                    let reply = match line.parse::<ConsoleCommand>() {
                        Ok(command) => self.execute(command).await,
                        Err(err) => Reply::Print(err.to_string()),
                    };
                    match reply {
                        Reply::Print(text) => println!("{text}"),
                        Reply::Silent => {}
                        Reply::Quit => break Ok(()),
                    }
                }
                Some(event) = events.recv() => print_event(&event),
            }
        };

        info!("Console closed");
        self.monitor.shutdown();
        result
    }
}

fn print_event(event: &LifecycleEvent) {
    match event {
        LifecycleEvent::Placeholder { url } => debug!(%url, "Resolving"),
        LifecycleEvent::Embedded { node, .. } | LifecycleEvent::Fallback { node, .. } => {
            println!("{}", render_text(node));
        }
        LifecycleEvent::Discarded { url } => warn!(%url, "Message left the feed before its embed"),
    }
}
