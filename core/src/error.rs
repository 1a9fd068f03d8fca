//! Error types for the content-platform API client.
//!
//! # Design
//! `NotFound` and `Unauthorized` get dedicated variants because callers
//! branch on them: a missing entity renders an empty view, and an auth
//! failure on the initial user fetch signs the whole application out. Every
//! other non-2xx response lands in `Request` with the status and the
//! server-provided message.
//!
//! `ApiError` is `Clone` so a cached failure can be handed to every caller
//! that awaited the same in-flight fetch.

use thiserror::Error;

/// Errors returned by the client, the fetch cache and mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// The server returned 401 or 403.
    #[error("not authorized (HTTP {status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// The server returned any other non-2xx status.
    #[error("HTTP {status}: {message}")]
    Request { status: u16, message: String },

    /// The request never produced an HTTP response.
    #[error("transport failed: {0}")]
    Transport(String),

    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// A payload failed a presence check; no request was issued.
    #[error("invalid input: {0}")]
    Validation(String),
}

/// Coarse classification used when surfacing an error to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or transport failure.
    Network,
    /// The server (or a local presence check) rejected the request.
    Rejected,
    /// Anything else: malformed payloads, unexpected statuses.
    Unexpected,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Transport(_) => ErrorKind::Network,
            ApiError::NotFound | ApiError::Unauthorized { .. } | ApiError::Validation(_) => {
                ErrorKind::Rejected
            }
            ApiError::Request { status, .. } if (400..500).contains(status) => ErrorKind::Rejected,
            ApiError::Request { .. }
            | ApiError::DeserializationError(_)
            | ApiError::SerializationError(_) => ErrorKind::Unexpected,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// HTTP status carried by the error, if the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::NotFound => Some(404),
            ApiError::Unauthorized { status, .. } | ApiError::Request { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}
