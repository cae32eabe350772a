//! Error types for the event log client

use std::time::Duration;

use proven_eventlog::{StreamName, TransportError};
use thiserror::Error;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the client, its message streams and subscriptions.
///
/// Three families exist: functional failures returned before any message
/// stream is handed out, relay faults raised while a stream is being consumed
/// and fatal usage or server contract violations.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// The caller may not read the target.
    #[error("access denied to '{0}'")]
    AccessDenied(StreamName),

    /// The stream never existed.
    #[error("stream '{0}' not found")]
    StreamNotFound(StreamName),

    /// The stream was soft deleted.
    #[error("stream '{0}' is deleted")]
    StreamDeleted(StreamName),

    /// The stream was permanently deleted.
    #[error("stream '{0}' is tombstoned")]
    StreamTombstoned(StreamName),

    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be translated.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The consumer did not make room in the queue in time.
    #[error("consumer did not drain the queue within {elapsed:?}")]
    ConsumerTimeout {
        /// How long the relay waited.
        elapsed: Duration,
    },

    /// Another iterator is already consuming the stream.
    #[error("an iterator is already active on this message stream")]
    IteratorActive,

    /// The server broke an invariant the client relies on.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// Invalid client or call settings.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this is an expected outcome of a read rather than a failure.
    #[must_use]
    pub const fn is_functional(&self) -> bool {
        matches!(
            self,
            Self::AccessDenied(_)
                | Self::StreamNotFound(_)
                | Self::StreamDeleted(_)
                | Self::StreamTombstoned(_)
        )
    }

    /// Whether this signals a broken invariant that retrying cannot fix.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::IteratorActive | Self::ContractViolation(_))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("relay task failed: {err}"))
    }
}
