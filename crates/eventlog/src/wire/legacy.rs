//! Frames of the legacy read/subscribe protocol.
//!
//! The legacy protocol sends one record per frame and carries record type,
//! content type and creation time as string system metadata. Failures other
//! than "stream not found" are reported as transport statuses rather than
//! frames.

use std::collections::HashMap;

use bytes::Bytes;
use uuid::Uuid;

use super::WireTimestamp;

/// System metadata key holding the record type.
pub const TYPE_KEY: &str = "type";

/// System metadata key holding the content type.
pub const CONTENT_TYPE_KEY: &str = "content-type";

/// System metadata key holding the creation time in 100 ns ticks since the Unix epoch.
pub const CREATED_KEY: &str = "created";

/// Content type of JSON payloads.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Content type of opaque binary payloads.
pub const CONTENT_TYPE_BINARY: &str = "application/octet-stream";

/// A record as stored by the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedEvent {
    /// Record id.
    pub id: Uuid,
    /// Stream the record was written to.
    pub stream_identifier: String,
    /// Revision within that stream.
    pub stream_revision: u64,
    /// Prepare position in the log.
    pub prepare_position: u64,
    /// Commit position in the log.
    pub commit_position: u64,
    /// System metadata (`type`, `content-type`, `created`).
    pub metadata: HashMap<String, String>,
    /// User metadata.
    pub custom_metadata: Bytes,
    /// Payload.
    pub data: Bytes,
}

/// A record, possibly reached through a link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadEvent {
    /// The resolved record, absent when a link points at a deleted record.
    pub event: Option<RecordedEvent>,
    /// The link record that pointed at `event`.
    pub link: Option<RecordedEvent>,
    /// Commit position of the read, `None` when the server reports no position.
    pub commit_position: Option<u64>,
}

/// A legacy read/subscribe response frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadResp {
    /// A record.
    Event(ReadEvent),
    /// The subscription was accepted.
    Confirmation {
        /// Server-issued subscription id.
        subscription_id: String,
    },
    /// Progress marker of a filtered read.
    Checkpoint {
        /// Commit position reached.
        commit_position: u64,
        /// Prepare position reached.
        prepare_position: u64,
        /// When the checkpoint was produced.
        timestamp: Option<WireTimestamp>,
    },
    /// The stream does not exist (or was soft deleted).
    StreamNotFound {
        /// The stream requested.
        stream_identifier: String,
    },
    /// First revision of the stream.
    FirstStreamPosition(u64),
    /// Last revision of the stream.
    LastStreamPosition(u64),
    /// Last position of the log.
    LastAllStreamPosition {
        /// Commit position.
        commit_position: u64,
        /// Prepare position.
        prepare_position: u64,
    },
    /// The reader reached the live edge.
    CaughtUp {
        /// When the live edge was reached.
        timestamp: Option<WireTimestamp>,
        /// Stream revision at the live edge.
        stream_revision: Option<u64>,
        /// Log position at the live edge, as (commit, prepare).
        position: Option<(u64, u64)>,
    },
    /// The reader fell behind the live edge.
    FellBehind {
        /// When the reader fell behind.
        timestamp: Option<WireTimestamp>,
        /// Stream revision at which it fell behind.
        stream_revision: Option<u64>,
        /// Log position at which it fell behind, as (commit, prepare).
        position: Option<(u64, u64)>,
    },
}
