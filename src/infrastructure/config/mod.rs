//! Application configuration.

/// Configuration file model.
pub mod app_config;
/// Command-line arguments.
pub mod args;
/// Configuration file loading.
pub mod storage;

pub use app_config::{
    AppConfig, CacheConfig, DEFAULT_API_BASE_URL, LogLevel, MonitorTimings, SelectorConfig,
};
pub use args::CliArgs;
pub use storage::{ConfigError, StorageManager};
