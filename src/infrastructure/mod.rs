//! Infrastructure layer with external service adapters.

/// Application configuration.
pub mod config;
/// HTTP transport backed by reqwest.
pub mod http;
/// Per-family content resolvers.
pub mod resolvers;

pub use config::{AppConfig, CliArgs, LogLevel, StorageManager};
pub use http::ReqwestTransport;
pub use resolvers::default_resolver_set;
