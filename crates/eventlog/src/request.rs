use serde::{Deserialize, Serialize};

use crate::filter::RecordFilter;
use crate::position::{Direction, LogPosition, StreamPosition, SubscribeFrom, SubscribeFromLog};
use crate::stream_name::StreamName;

/// What a read covers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadTarget {
    /// A single stream.
    Stream {
        /// The stream to read.
        stream: StreamName,
        /// Starting revision.
        from: StreamPosition,
    },
    /// The whole log.
    All {
        /// Starting position.
        from: LogPosition,
        /// Optional server-side filter.
        filter: Option<RecordFilter>,
    },
}

/// A finite read of a stream or the log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    /// What to read.
    pub target: ReadTarget,
    /// Read direction.
    pub direction: Direction,
    /// Maximum number of records, `None` for unbounded.
    pub max_count: Option<u64>,
    /// Whether link records are resolved to the records they point at.
    pub resolve_links: bool,
    /// Whether the server interleaves heartbeats with the records.
    pub heartbeats: bool,
}

impl ReadRequest {
    /// The stream this request targets, if stream-scoped.
    #[must_use]
    pub const fn stream(&self) -> Option<&StreamName> {
        match &self.target {
            ReadTarget::Stream { stream, .. } => Some(stream),
            ReadTarget::All { .. } => None,
        }
    }
}

/// What a subscription follows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscribeTarget {
    /// A single stream.
    Stream {
        /// The stream to follow.
        stream: StreamName,
        /// Where to start.
        from: SubscribeFrom,
    },
    /// The whole log.
    All {
        /// Where to start.
        from: SubscribeFromLog,
        /// Optional server-side filter.
        filter: Option<RecordFilter>,
    },
}

/// A live subscription to a stream or the log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// What to follow.
    pub target: SubscribeTarget,
    /// Whether link records are resolved to the records they point at.
    pub resolve_links: bool,
}

impl SubscribeRequest {
    /// The stream this request targets, if stream-scoped.
    #[must_use]
    pub const fn stream(&self) -> Option<&StreamName> {
        match &self.target {
            SubscribeTarget::Stream { stream, .. } => Some(stream),
            SubscribeTarget::All { .. } => None,
        }
    }
}
