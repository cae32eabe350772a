use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

use crate::error::TransportError;
use crate::position::Position;
use crate::schema::SchemaInfo;
use crate::stream_name::StreamName;

/// Revision a stream must be at for an append to succeed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExpectedRevision {
    /// No check.
    #[default]
    Any,
    /// The stream must not exist.
    NoStream,
    /// The stream must exist.
    StreamExists,
    /// The stream's last revision must be exactly this.
    Exact(u64),
}

/// A record to append.
#[derive(Clone, Debug, PartialEq)]
pub struct ProposedRecord {
    /// Record id.
    pub id: Uuid,
    /// Schema hint.
    pub schema: SchemaInfo,
    /// Structured user properties.
    pub properties: HashMap<String, serde_json::Value>,
    /// Payload.
    pub data: Bytes,
}

impl ProposedRecord {
    /// Creates a record with a fresh id and no properties.
    pub fn new(schema: SchemaInfo, data: impl Into<Bytes>) -> Self {
        Self {
            id: Uuid::new_v4(),
            schema,
            properties: HashMap::new(),
            data: data.into(),
        }
    }

    /// Adds a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

/// Outcome of a successful append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppendSuccess {
    /// Revision of the last appended record.
    pub next_expected_revision: u64,
    /// Log position of the last appended record.
    pub position: Position,
}

/// Errors raised by an append.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AppendError {
    /// The caller may not write to the stream.
    #[error("access denied to stream '{0}'")]
    AccessDenied(StreamName),

    /// The stream was permanently deleted.
    #[error("stream '{0}' is tombstoned")]
    StreamTombstoned(StreamName),

    /// The stream was not at the expected revision.
    #[error("stream '{stream}' expected {expected:?}, actual {actual:?}")]
    WrongExpectedRevision {
        /// Stream written to.
        stream: StreamName,
        /// Revision the caller expected.
        expected: ExpectedRevision,
        /// Actual last revision, `None` if the stream does not exist.
        actual: Option<u64>,
    },

    /// The append could not be delivered.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// The append path of an event log.
#[async_trait]
pub trait Appender: Clone + Send + Sync + 'static {
    /// Appends `records` atomically to `stream`.
    async fn append(
        &self,
        stream: StreamName,
        expected: ExpectedRevision,
        records: Vec<ProposedRecord>,
    ) -> Result<AppendSuccess, AppendError>;
}
