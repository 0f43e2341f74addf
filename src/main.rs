use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use oxiembed::application::services::{
    ContainerMonitor, ContentRegistry, EmbedController, IngestionPipeline, RequestCache,
};
use oxiembed::domain::dom::Document;
use oxiembed::domain::ports::EmbedRenderer;
use oxiembed::infrastructure::{
    AppConfig, CliArgs, ReqwestTransport, StorageManager, default_resolver_set,
};
use oxiembed::presentation::{ConsoleHost, TextRenderer, banner_hook, mount_feed};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = &config.log_path {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .init();
    }

    Ok(())
}

fn load_config() -> Result<AppConfig> {
    let args = CliArgs::parse();
    let storage = StorageManager::new()?;
    let mut config = storage.load_config(args.config.as_deref())?;
    config.merge_with_args(args);
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let config = load_config()?;
    init_logging(&config)?;

    info!(version = oxiembed::VERSION, "Starting {}", oxiembed::NAME);

    let api_base = Url::parse(&config.api_base_url)
        .wrap_err_with(|| format!("invalid api_base_url {:?}", config.api_base_url))?;
    let policy = config.cache.policy();
    let transport = Arc::new(ReqwestTransport::new(policy.request_timeout)?);
    let cache = RequestCache::new(transport, policy);

    let document = Document::new();
    let feed = mount_feed(&document);
    let renderer: Arc<dyn EmbedRenderer> = Arc::new(TextRenderer::new());

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let controller = Arc::new(
        EmbedController::new(
            document.clone(),
            ContentRegistry::new(default_resolver_set(&cache, &api_base)),
            Arc::clone(&renderer),
        )
        .with_pacing(config.pacing())
        .with_events(events_tx),
    );

    let (settings_tx, settings_rx) = watch::channel(config.embed_settings());

    let monitor_config = config.selectors.monitor_config(&config.monitor)?;
    let (monitor, handle, feed_events) = ContainerMonitor::new(document.clone(), monitor_config);
    let monitor = monitor.with_ready_hook(banner_hook(
        renderer,
        document,
        config.monitor.banner_duration(),
    ));

    let pipeline = IngestionPipeline::new(
        config.selectors.ingestion_config(&config.monitor)?,
        Arc::clone(&controller),
        handle.clone(),
        settings_rx,
    );

    let monitor_task = tokio::spawn(monitor.run());
    let pipeline_task = tokio::spawn(pipeline.run(feed_events));

    let console = ConsoleHost::new(controller, cache, handle, settings_tx, feed);
    let result = console.run(events_rx).await;

    monitor_task.await?;
    pipeline_task.await?;
    info!("Shutdown complete");

    result
}
