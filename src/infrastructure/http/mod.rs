//! HTTP adapters.

/// reqwest-backed transport.
pub mod reqwest_transport;

pub use reqwest_transport::ReqwestTransport;
