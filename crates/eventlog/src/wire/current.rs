//! Frames of the current read/subscribe protocol.
//!
//! The current protocol batches records, carries a typed schema hint and
//! structured properties on each record, and reports read failures as
//! frames instead of transport statuses.

use std::collections::HashMap;

use bytes::Bytes;
use uuid::Uuid;

use super::WireTimestamp;
use crate::schema::SchemaInfo;

/// The link record through which a record was reached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkRef {
    /// Stream holding the link.
    pub stream: String,
    /// Revision of the link in that stream.
    pub stream_revision: u64,
    /// Log position of the link.
    pub position: u64,
}

/// A record.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// Record id.
    pub record_id: Uuid,
    /// Stream the record was written to.
    pub stream: String,
    /// Revision within that stream.
    pub stream_revision: u64,
    /// Log position.
    pub position: u64,
    /// Creation time.
    pub timestamp: WireTimestamp,
    /// Schema hint.
    pub schema: SchemaInfo,
    /// Structured user properties.
    pub properties: HashMap<String, serde_json::Value>,
    /// Payload.
    pub data: Bytes,
    /// Link through which the record was reached, if any.
    pub link: Option<LinkRef>,
    /// Revision of the record in the index it was read from, when the
    /// server reports one explicitly.
    pub index_revision: Option<u64>,
}

/// Kind of a heartbeat frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeartbeatKind {
    /// Progress marker of a filtered read.
    Checkpoint,
    /// The reader reached the live edge.
    CaughtUp,
    /// The reader fell behind the live edge.
    FellBehind,
}

/// Kind of a failure frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The caller may not read the target.
    AccessDenied,
    /// The stream does not exist (or was soft deleted).
    StreamNotFound,
    /// The stream was deleted.
    StreamDeleted,
    /// The stream was permanently deleted.
    StreamTombstoned,
}

/// A current read/subscribe response frame.
#[derive(Clone, Debug, PartialEq)]
pub enum ReadResponse {
    /// A batch of records, in log order.
    Records(Vec<Record>),
    /// A heartbeat.
    Heartbeat {
        /// Heartbeat kind.
        kind: HeartbeatKind,
        /// Log position, when known.
        position: Option<u64>,
        /// Stream revision, when known.
        stream_revision: Option<u64>,
        /// When the heartbeat was produced.
        timestamp: Option<WireTimestamp>,
    },
    /// The read failed.
    Failure {
        /// Failure kind.
        kind: FailureKind,
        /// Stream involved, when stream-scoped.
        stream: Option<String>,
    },
    /// The subscription was accepted.
    SubscriptionConfirmed {
        /// Server-issued subscription id.
        subscription_id: String,
    },
}
