use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Status metadata key in which the legacy server names the failure.
pub const EXCEPTION_KEY: &str = "exception";

/// Legacy exception names carried under [`EXCEPTION_KEY`].
pub mod exceptions {
    /// The caller may not perform the operation.
    pub const ACCESS_DENIED: &str = "access-denied";
    /// The stream was permanently deleted.
    pub const STREAM_DELETED: &str = "stream-deleted";
    /// The stream does not exist.
    pub const STREAM_NOT_FOUND: &str = "stream-not-found";
    /// The expected revision did not match.
    ///
    /// Some server paths report deleted streams with this code.
    pub const WRONG_EXPECTED_VERSION: &str = "wrong-expected-version";
    /// The node is not the leader.
    pub const NOT_LEADER: &str = "not-leader";
}

/// Coarse status codes of an RPC failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// The operation was cancelled.
    Cancelled,
    /// Unknown failure.
    Unknown,
    /// Invalid request.
    InvalidArgument,
    /// Deadline expired.
    DeadlineExceeded,
    /// Entity not found.
    NotFound,
    /// Precondition failed.
    FailedPrecondition,
    /// The caller lacks permission.
    PermissionDenied,
    /// The caller is not authenticated.
    Unauthenticated,
    /// The service is unavailable.
    Unavailable,
    /// Internal server failure.
    Internal,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
            Self::InvalidArgument => "invalid argument",
            Self::DeadlineExceeded => "deadline exceeded",
            Self::NotFound => "not found",
            Self::FailedPrecondition => "failed precondition",
            Self::PermissionDenied => "permission denied",
            Self::Unauthenticated => "unauthenticated",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Status returned by the server when an RPC fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    /// Status code.
    pub code: StatusCode,
    /// Human readable message.
    pub message: String,
    /// Trailing metadata.
    pub metadata: HashMap<String, String>,
}

impl Status {
    /// Creates a status without metadata.
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            metadata: HashMap::new(),
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Adds the legacy exception name.
    #[must_use]
    pub fn with_exception(self, exception: &str) -> Self {
        self.with_metadata(EXCEPTION_KEY, exception)
    }

    /// The legacy exception name, if any.
    #[must_use]
    pub fn exception(&self) -> Option<&str> {
        self.metadata.get(EXCEPTION_KEY).map(String::as_str)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exception() {
            Some(exception) => write!(f, "{} ({exception}): {}", self.code, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

/// Errors raised by a transport or one of its sessions.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The server failed the RPC.
    #[error("rpc failed: {0}")]
    Status(Status),

    /// The server could not be reached or the connection dropped.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// The session was cancelled locally.
    #[error("session cancelled")]
    Cancelled,

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Other(String),
}

impl From<Status> for TransportError {
    fn from(status: Status) -> Self {
        Self::Status(status)
    }
}
