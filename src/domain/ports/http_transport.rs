//! HTTP transport port used by the request cache.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use url::Url;

/// Body shape a caller expects back. Part of the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseShape {
    /// JSON document.
    Json,
    /// HTML page.
    Html,
}

impl ResponseShape {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Html => "html",
        }
    }

    /// Value for the `Accept` header.
    #[must_use]
    pub const fn accept(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Html => "text/html,application/xhtml+xml",
        }
    }
}

/// A GET request and everything that makes it distinct for caching.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestDescriptor {
    url: Url,
    headers: Vec<(String, String)>,
    shape: ResponseShape,
}

impl RequestDescriptor {
    /// GET request expecting JSON.
    #[must_use]
    pub fn json(url: Url) -> Self {
        Self {
            url,
            headers: Vec::new(),
            shape: ResponseShape::Json,
        }
    }

    /// GET request expecting HTML.
    #[must_use]
    pub fn html(url: Url) -> Self {
        Self {
            url,
            headers: Vec::new(),
            shape: ResponseShape::Html,
        }
    }

    /// Adds a header. Header names are lowercased and kept sorted.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let name = name.to_ascii_lowercase();
        self.headers.retain(|(existing, _)| *existing != name);
        self.headers.push((name, value.into()));
        self.headers.sort();
        self
    }

    /// Target URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Extra request headers.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Expected body format.
    #[must_use]
    pub const fn shape(&self) -> ResponseShape {
        self.shape
    }

    /// Normalized key: method, URL, headers and expected shape.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let mut key = format!("GET {} {}", self.url, self.shape.as_str());
        for (name, value) in &self.headers {
            key.push(' ');
            key.push_str(name);
            key.push('=');
            key.push_str(value);
        }
        key
    }
}

impl fmt::Display for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GET {}", self.url)
    }
}

/// Raw response from the transport.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Bytes,
}

impl TransportResponse {
    /// Creates a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns whether the status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Failures below the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {message}")]
    Connect { message: String },

    #[error("{message}")]
    Other { message: String },
}

/// Port for issuing HTTP requests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Executes one request. Never retries.
    async fn execute(&self, request: &RequestDescriptor)
    -> Result<TransportResponse, TransportError>;
}
