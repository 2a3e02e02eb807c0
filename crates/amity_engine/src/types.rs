use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub type BookmarkId = u64;
pub type IdentityId = u64;
/// The local actor a stored bookmark belongs to.
pub type ActorId = u64;

/// The clean title/body/date triple produced by one extraction, with the
/// source URL attached by the orchestrator. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedItem {
    /// Plain text, markup removed.
    pub title: String,
    /// Sanitized HTML limited to the storage allow-list.
    pub content: String,
    pub date: DateTime<Utc>,
    pub url: String,
}

/// Terminal outcomes of `save_bookmark`. None of these are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookmarkError {
    #[error("you entered an invalid URL")]
    InvalidUrl,
    #[error("no content was extracted")]
    InvalidContent,
    #[error("could not download the URL")]
    CouldNotDownload,
}

/// Terminal outcomes of the handshake operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    #[error("unknown token or identity")]
    NotFound,
    #[error("proof verification failed")]
    VerificationFailed,
    #[error("could not reach the peer: {0}")]
    PeerUnreachable(String),
    #[error("peer did not complete the exchange: {0}")]
    PeerRejected(String),
    #[error("operation is not valid for the current trust level")]
    InvalidState,
}

impl From<amity_core::TransitionError> for HandshakeError {
    fn from(err: amity_core::TransitionError) -> Self {
        match err {
            amity_core::TransitionError::VerificationFailed => HandshakeError::VerificationFailed,
            amity_core::TransitionError::InvalidTransition(_) => HandshakeError::InvalidState,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FetchFailure,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for FetchError {}

/// Callers must treat `Timeout` and `RedirectLimitExceeded` exactly like a
/// non-200 response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Network,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::InvalidUrl => write!(f, "invalid url"),
            FetchFailure::HttpStatus(code) => write!(f, "http status {code}"),
            FetchFailure::Timeout => write!(f, "timeout"),
            FetchFailure::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FetchFailure::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FetchFailure::Network => write!(f, "network error"),
        }
    }
}
