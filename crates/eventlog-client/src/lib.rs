//! Client for reading and subscribing to an append-only event log.
//!
//! Each read or subscription is a single server-streaming session. Its first
//! frame is inspected before the call returns, so missing, deleted and
//! inaccessible streams surface as errors up front. The rest of the session
//! is pumped by a background relay into a bounded queue that the caller
//! drains through a [`MessageStream`] or [`Subscription`]. A consumer that
//! stops draining for longer than the configured timeout faults the relay
//! instead of growing the queue.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod classify;
mod client;
mod error;
mod existence;
mod heartbeat;
mod message;
mod message_stream;
mod options;
mod record;
mod relay;
mod settings;
mod subscription;
mod translate;

pub use client::EventLogClient;
pub use error::{Error, Result};
pub use existence::{StreamInfo, StreamState, VersionedMetadata};
pub use heartbeat::{Heartbeat, HeartbeatKind};
pub use message::ReadMessage;
pub use message_stream::{MessageStream, Messages, RelayState};
pub use options::{
    ReadAllOptions, ReadStreamOptions, StreamingOptions, SubscribeToAllOptions,
    SubscribeToStreamOptions,
};
pub use record::{Decoded, Link, Payload, Record};
pub use settings::{ClientSettings, DecodeMode, RelaySettings};
pub use subscription::Subscription;
