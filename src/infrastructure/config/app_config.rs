//! Application configuration.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use super::args::CliArgs;
use crate::application::services::{CachePolicy, IngestionConfig, MonitorConfig};
use crate::domain::dom::{Selector, SelectorError};
use crate::domain::entities::{EmbedSettings, FeatureFlags, Presentation};

pub(super) const APP_NAME: &str = "oxiembed";
pub(super) const APP_QUALIFIER: &str = "com";
pub(super) const APP_ORGANIZATION: &str = "linuxmobile";

/// Provider endpoint used by the YouTube and Twitch resolvers.
pub const DEFAULT_API_BASE_URL: &str = "https://api.the-coven.fr";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration, read from TOML and overridden by CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path. Logs go to stderr when unset.
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Per-family switches.
    #[serde(default)]
    pub features: FeatureFlags,

    /// Style and image bounds.
    #[serde(default)]
    pub presentation: Presentation,

    /// Fetch layer tuning.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Container search and observation timings.
    #[serde(default)]
    pub monitor: MonitorTimings,

    /// Host page selectors.
    #[serde(default)]
    pub selectors: SelectorConfig,

    /// Delay between two links of one batch, in milliseconds.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Base URL of the YouTube/Twitch metadata API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

/// Fetch layer tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Seconds a successful response stays fresh.
    pub ttl_secs: u64,
    /// Seconds a failed request is refused.
    pub cooldown_secs: u64,
    /// Attempts per request, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds. Doubles after each retry.
    pub retry_base_ms: u64,
    /// Time budget of one attempt, in seconds.
    pub request_timeout_secs: u64,
    /// Maximum cached responses.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let policy = CachePolicy::default();
        Self {
            ttl_secs: policy.ttl.as_secs(),
            cooldown_secs: policy.cooldown.as_secs(),
            max_attempts: policy.max_attempts,
            retry_base_ms: 500,
            request_timeout_secs: policy.request_timeout.as_secs(),
            capacity: policy.capacity,
        }
    }
}

impl CacheConfig {
    /// Builds the cache policy. At least one attempt and one entry are kept.
    #[must_use]
    pub fn policy(&self) -> CachePolicy {
        CachePolicy {
            ttl: Duration::from_secs(self.ttl_secs),
            cooldown: Duration::from_secs(self.cooldown_secs),
            max_attempts: self.max_attempts.max(1),
            retry_base: Duration::from_millis(self.retry_base_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
            capacity: self.capacity.max(1),
        }
    }
}

/// Container monitor timings, in milliseconds unless noted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorTimings {
    pub retry_interval_ms: u64,
    /// Probes before the search gives up.
    pub max_retries: u32,
    pub liveness_interval_ms: u64,
    pub initial_sweep_delay_ms: u64,
    /// How long the ready banner stays up.
    pub banner_duration_ms: u64,
}

impl Default for MonitorTimings {
    fn default() -> Self {
        Self {
            retry_interval_ms: 1000,
            max_retries: 10,
            liveness_interval_ms: 2000,
            initial_sweep_delay_ms: 1000,
            banner_duration_ms: 5000,
        }
    }
}

impl MonitorTimings {
    /// Banner lifetime.
    #[must_use]
    pub const fn banner_duration(&self) -> Duration {
        Duration::from_millis(self.banner_duration_ms)
    }
}

/// Host page selectors, as written in the host's CSS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Container selectors probed first, in order.
    pub primary: Vec<String>,
    /// Structural container selectors probed after the primary list.
    pub fallback: Vec<String>,
    /// Matches one chat message.
    pub message: String,
    /// Matches candidate links inside a message.
    pub link: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            primary: [
                ".chat-scrollable-area__message-container",
                "[data-test-selector=\"chat-scrollable-area__message-container\"]",
                "[data-a-target=\"chat-scrollable-area\"]",
                ".stream-chat",
                "twitch-chat",
                ".chat-list",
                ".chat-room",
            ]
            .map(String::from)
            .to_vec(),
            fallback: [
                "[class*=\"chat-scrollable-area\"]",
                "[class*=\"message-container\"]",
                "[class*=\"chat-list\"]",
                ".chat-room",
                "section[aria-label*=\"chat\"]",
            ]
            .map(String::from)
            .to_vec(),
            message: ".chat-line__message, [data-a-target=\"chat-line-message\"]".to_string(),
            link: "a[href^=\"http\"]".to_string(),
        }
    }
}

impl SelectorConfig {
    /// Parses the container selectors with `timings` into a monitor config.
    ///
    /// # Errors
    ///
    /// Returns `SelectorError` for the first selector that does not parse.
    pub fn monitor_config(&self, timings: &MonitorTimings) -> Result<MonitorConfig, SelectorError> {
        let primary = parse_all(&self.primary)?;
        let fallback = parse_all(&self.fallback)?;
        Ok(MonitorConfig {
            retry_interval: Duration::from_millis(timings.retry_interval_ms),
            max_retries: timings.max_retries.max(1),
            liveness_interval: Duration::from_millis(timings.liveness_interval_ms.max(1)),
            ..MonitorConfig::new(primary, fallback)
        })
    }

    /// Parses the message and link selectors into an ingestion config.
    ///
    /// # Errors
    ///
    /// Returns `SelectorError` if either selector does not parse.
    pub fn ingestion_config(
        &self,
        timings: &MonitorTimings,
    ) -> Result<IngestionConfig, SelectorError> {
        Ok(IngestionConfig {
            initial_sweep_delay: Duration::from_millis(timings.initial_sweep_delay_ms),
            ..IngestionConfig::new(Selector::parse(&self.message)?, Selector::parse(&self.link)?)
        })
    }
}

fn parse_all(sources: &[String]) -> Result<Vec<Selector>, SelectorError> {
    sources.iter().map(|source| Selector::parse(source)).collect()
}

fn default_pacing_ms() -> u64 {
    50
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: CliArgs) {
        if let Some(config_path) = args.config {
            self.config = Some(config_path);
        }
        if let Some(log_path) = args.log_path {
            self.log_path = Some(log_path);
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(enabled) = args.enabled {
            self.features.enabled = enabled;
        }
        if let Some(style) = args.style {
            self.presentation.style = style;
        }
        if let Some(width) = args.max_image_width {
            self.presentation.max_image_width = width;
        }
        if let Some(height) = args.max_image_height {
            self.presentation.max_image_height = height;
        }
        if let Some(pacing_ms) = args.pacing_ms {
            self.pacing_ms = pacing_ms;
        }
        if let Some(api_base_url) = args.api_base_url {
            self.api_base_url = api_base_url;
        }
        for family in args.disable {
            if self.features.family_enabled(family) {
                self.features.toggle(family);
            }
        }
    }

    /// Settings snapshot with clamped presentation bounds.
    #[must_use]
    pub const fn embed_settings(&self) -> EmbedSettings {
        EmbedSettings::new(self.features, self.presentation)
    }

    /// Delay between two links of one batch.
    #[must_use]
    pub const fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default config file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Returns effective config path.
    #[must_use]
    pub fn effective_config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(Self::default_config_path)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config: None,
            log_path: None,
            log_level: LogLevel::Info,
            features: FeatureFlags::default(),
            presentation: Presentation::default(),
            cache: CacheConfig::default(),
            monitor: MonitorTimings::default(),
            selectors: SelectorConfig::default(),
            pacing_ms: default_pacing_ms(),
            api_base_url: default_api_base_url(),
        }
    }
}
