use bytes::Bytes;
use chrono::{DateTime, Utc};
use proven_eventlog::{DecodeError, Decoder, Position, SchemaInfo, StreamName};
use uuid::Uuid;

/// The link record through which a record was reached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
    /// Stream holding the link.
    pub stream: StreamName,
    /// Revision of the link in that stream.
    pub revision: u64,
    /// Log position of the link.
    pub position: Position,
}

/// Outcome of decoding a payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Decoded {
    /// Decoding was skipped, or the payload is opaque bytes.
    Skipped,
    /// The decoded value.
    Value(serde_json::Value),
    /// Decoding failed.
    Failed(DecodeError),
}

/// A record payload with its decoding outcome.
#[derive(Clone, Debug, PartialEq)]
pub struct Payload {
    raw: Bytes,
    decoded: Decoded,
}

impl Payload {
    pub(crate) const fn new(raw: Bytes, decoded: Decoded) -> Self {
        Self { raw, decoded }
    }

    /// The raw payload bytes.
    #[must_use]
    pub const fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// The decoding outcome.
    #[must_use]
    pub const fn decoded(&self) -> &Decoded {
        &self.decoded
    }

    /// The decoded value, if decoding succeeded.
    #[must_use]
    pub const fn value(&self) -> Option<&serde_json::Value> {
        match &self.decoded {
            Decoded::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The decode error, if decoding failed.
    #[must_use]
    pub const fn error(&self) -> Option<&DecodeError> {
        match &self.decoded {
            Decoded::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// A log entry as delivered to a consumer.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// Record id.
    pub id: Uuid,
    /// Stream the record was written to.
    pub stream: StreamName,
    /// Revision within that stream.
    pub revision: u64,
    /// Log position.
    pub position: Position,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Schema hint.
    pub schema: SchemaInfo,
    /// User metadata.
    pub metadata: Bytes,
    /// Payload.
    pub payload: Payload,
    /// Link through which the record was reached, if any.
    pub link: Option<Link>,
    /// Revision in the stream the record was read from: the link's revision
    /// for resolved links, otherwise the record's own revision.
    pub index_revision: u64,
}

impl Record {
    /// The record type.
    #[must_use]
    pub fn record_type(&self) -> &str {
        &self.schema.name
    }

    /// Whether the record was reached through a link.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.link.is_some()
    }

    /// Decodes the raw payload with `decoder`, whatever the stored outcome.
    ///
    /// # Errors
    ///
    /// Returns the decoder's error.
    pub fn decode_with(&self, decoder: &dyn Decoder) -> Result<serde_json::Value, DecodeError> {
        decoder.decode(&self.payload.raw, &self.schema)
    }
}
