use super::app_config::LogLevel;
use crate::domain::entities::{ContentFamily, EmbedStyle};
use clap::Parser;
use std::path::PathBuf;

/// Command-line overrides for the configuration file.
#[derive(Debug, Parser)]
#[command(
    name = "oxiembed",
    version,
    about = "Turns links in a live chat feed into rich embeds",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Master switch for embedding.
    #[arg(long)]
    pub enabled: Option<bool>,

    /// Turns a content family off. Repeatable.
    #[arg(long, value_name = "FAMILY")]
    pub disable: Vec<ContentFamily>,

    /// Embed style (dark-glass, light-glass).
    #[arg(long)]
    pub style: Option<EmbedStyle>,

    /// Maximum image width in pixels.
    #[arg(long)]
    pub max_image_width: Option<u32>,

    /// Maximum image height in pixels.
    #[arg(long)]
    pub max_image_height: Option<u32>,

    /// Delay between links of one batch, in milliseconds.
    #[arg(long)]
    pub pacing_ms: Option<u64>,

    /// Base URL of the YouTube/Twitch metadata API.
    #[arg(long, env = "OXIEMBED_API_BASE_URL")]
    pub api_base_url: Option<String>,
}
