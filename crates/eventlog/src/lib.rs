//! Contract types for reading and subscribing to an append-only event log.
//!
//! Covers stream naming, positions, both wire-protocol generations, the
//! transport a client opens sessions through, payload decoding and the
//! append path.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod append;
mod decoder;
mod error;
mod filter;
mod metadata;
mod position;
mod request;
mod schema;
mod stream_name;
mod transport;

pub mod wire;

pub use append::{AppendError, AppendSuccess, Appender, ExpectedRevision, ProposedRecord};
pub use decoder::{DecodeError, Decoder, JsonDecoder};
pub use error::{EXCEPTION_KEY, Status, StatusCode, TransportError, exceptions};
pub use filter::{DEFAULT_CHECKPOINT_INTERVAL, FilterExpression, FilterTarget, RecordFilter};
pub use metadata::{METADATA_RECORD_TYPE, StreamAcl, StreamMetadata, TRUNCATE_BEFORE_DELETED};
pub use position::{
    Direction, LogPosition, Position, StreamPosition, SubscribeFrom, SubscribeFromLog,
};
pub use request::{ReadRequest, ReadTarget, SubscribeRequest, SubscribeTarget};
pub use schema::{DataFormat, SchemaInfo};
pub use stream_name::{ALL_STREAM, METADATA_STREAM_PREFIX, SYSTEM_STREAM_PREFIX, StreamName};
pub use transport::{Transport, WireSession};
pub use wire::{ProtocolVersion, WireFrame, WireTimestamp};
