//! Errors surfaced by the request cache.

use thiserror::Error;

/// Terminal failure of a cached fetch. Cloned to every caller sharing the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum FetchError {
    #[error("request to {url} timed out after {timeout_ms}ms")]
    TransportTimeout { url: String, timeout_ms: u64 },

    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("{url} answered with status {status}")]
    ServerError { url: String, status: u16 },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("{url} failed recently, retry in {remaining_ms}ms")]
    RecentFailure { url: String, remaining_ms: u64 },
}

impl FetchError {
    /// Creates a transport error.
    #[must_use]
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Returns whether another attempt may succeed.
    ///
    /// Timeouts, transport errors, 5xx and 429 are retryable. Decode failures
    /// and cooldown rejections are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransportTimeout { .. } | Self::Transport { .. } | Self::ServerError { .. }
        )
    }

    /// Returns whether the status code is worth retrying.
    #[must_use]
    pub const fn is_retryable_status(status: u16) -> bool {
        status == 429 || status >= 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::transport("u", "reset").is_retryable());
        assert!(
            FetchError::ServerError {
                url: "u".into(),
                status: 503
            }
            .is_retryable()
        );
        assert!(!FetchError::decode("u", "bad json").is_retryable());
        assert!(
            !FetchError::RecentFailure {
                url: "u".into(),
                remaining_ms: 10
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_retryable_status() {
        assert!(FetchError::is_retryable_status(429));
        assert!(FetchError::is_retryable_status(503));
        assert!(!FetchError::is_retryable_status(404));
        assert!(!FetchError::is_retryable_status(200));
    }
}
