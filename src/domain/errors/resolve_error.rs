//! Errors produced while resolving a link into content.

use thiserror::Error;

use super::FetchError;
use crate::domain::entities::ContentFamily;

/// Why a link could not be turned into an embed. Every variant degrades to a plain link.
#[derive(Debug, Clone, Error)]
#[allow(missing_docs)]
pub enum ResolveError {
    #[error("{family} resolver declined: {reason}")]
    Declined {
        family: ContentFamily,
        reason: String,
    },

    #[error("{family} provider returned no content")]
    EmptyResult { family: ContentFamily },

    #[error("{family} provider rejected the request with status {status}")]
    ClientRejected { family: ContentFamily, status: u16 },

    #[error("{family} fetch failed: {source}")]
    Fetch {
        family: ContentFamily,
        #[source]
        source: FetchError,
    },

    #[error("{family} payload was unusable: {message}")]
    Payload {
        family: ContentFamily,
        message: String,
    },
}

impl ResolveError {
    /// Creates a declined error.
    #[must_use]
    pub fn declined(family: ContentFamily, reason: impl Into<String>) -> Self {
        Self::Declined {
            family,
            reason: reason.into(),
        }
    }

    /// Wraps a fetch failure.
    #[must_use]
    pub const fn fetch(family: ContentFamily, source: FetchError) -> Self {
        Self::Fetch { family, source }
    }

    /// Creates a payload error.
    #[must_use]
    pub fn payload(family: ContentFamily, message: impl Into<String>) -> Self {
        Self::Payload {
            family,
            message: message.into(),
        }
    }

    /// Family whose resolver produced the error.
    #[must_use]
    pub const fn family(&self) -> ContentFamily {
        match self {
            Self::Declined { family, .. }
            | Self::EmptyResult { family }
            | Self::ClientRejected { family, .. }
            | Self::Fetch { family, .. }
            | Self::Payload { family, .. } => *family,
        }
    }

    /// Returns whether this is an expected, quiet outcome rather than a failure.
    #[must_use]
    pub const fn is_benign(&self) -> bool {
        matches!(
            self,
            Self::Declined { .. } | Self::EmptyResult { .. } | Self::ClientRejected { .. }
        )
    }
}
