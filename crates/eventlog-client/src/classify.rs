//! Classification of server-reported failures.
//!
//! The legacy protocol reports failures as transport statuses named by an
//! `exception` metadata entry; the current protocol reports them as frames.
//! Both are folded into [`ServerFailure`] before they are turned into errors.

use proven_eventlog::wire::current::{FailureKind, ReadResponse};
use proven_eventlog::wire::legacy::ReadResp;
use proven_eventlog::{StatusCode, StreamName, TransportError, WireFrame, exceptions};

use crate::error::Error;

/// A failure the server reported for a read or subscribe target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ServerFailure {
    AccessDenied,
    /// Never existed or soft deleted; the wire does not tell them apart.
    NotFound,
    Deleted,
    Tombstoned,
    /// The legacy server reports some deletes as a wrong expected version.
    Ambiguous,
}

impl ServerFailure {
    /// The error for this failure, without any disambiguation.
    pub(crate) fn into_error(self, target: &StreamName) -> Error {
        let target = target.clone();
        match self {
            Self::AccessDenied => Error::AccessDenied(target),
            Self::NotFound => Error::StreamNotFound(target),
            Self::Deleted => Error::StreamDeleted(target),
            Self::Tombstoned | Self::Ambiguous => Error::StreamTombstoned(target),
        }
    }
}

/// Classifies a transport error, `None` when it is not a target failure.
pub(crate) fn status_failure(error: &TransportError) -> Option<ServerFailure> {
    let TransportError::Status(status) = error else {
        return None;
    };

    match status.exception() {
        Some(exceptions::ACCESS_DENIED) => Some(ServerFailure::AccessDenied),
        Some(exceptions::STREAM_NOT_FOUND) => Some(ServerFailure::NotFound),
        Some(exceptions::STREAM_DELETED) => Some(ServerFailure::Tombstoned),
        Some(exceptions::WRONG_EXPECTED_VERSION) => Some(ServerFailure::Ambiguous),
        Some(_) => None,
        None => match status.code {
            StatusCode::PermissionDenied | StatusCode::Unauthenticated => {
                Some(ServerFailure::AccessDenied)
            }
            StatusCode::NotFound => Some(ServerFailure::NotFound),
            _ => None,
        },
    }
}

/// Classifies an in-band failure frame, `None` for any other frame.
pub(crate) const fn frame_failure(frame: &WireFrame) -> Option<ServerFailure> {
    match frame {
        WireFrame::Legacy(ReadResp::StreamNotFound { .. }) => Some(ServerFailure::NotFound),
        WireFrame::Current(ReadResponse::Failure { kind, .. }) => Some(failure_kind(*kind)),
        _ => None,
    }
}

pub(crate) const fn failure_kind(kind: FailureKind) -> ServerFailure {
    match kind {
        FailureKind::AccessDenied => ServerFailure::AccessDenied,
        FailureKind::StreamNotFound => ServerFailure::NotFound,
        FailureKind::StreamDeleted => ServerFailure::Deleted,
        FailureKind::StreamTombstoned => ServerFailure::Tombstoned,
    }
}

/// The error a relay faults with for a transport error raised mid-stream.
pub(crate) fn transport_fault(error: TransportError, target: &StreamName) -> Error {
    status_failure(&error).map_or(Error::Transport(error), |failure| {
        failure.into_error(target)
    })
}
