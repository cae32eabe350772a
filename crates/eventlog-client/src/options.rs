//! Per-call options. Unset values fall back to the client settings.

use std::time::Duration;

use proven_eventlog::{
    Direction, LogPosition, RecordFilter, StreamPosition, SubscribeFrom, SubscribeFromLog,
};
use tokio_util::sync::CancellationToken;

use crate::settings::DecodeMode;

/// Relay and decoding overrides shared by every streaming call.
#[derive(Clone, Debug, Default)]
pub struct StreamingOptions {
    /// Resolve link records.
    pub resolve_links: Option<bool>,
    /// Queue capacity.
    pub queue_capacity: Option<usize>,
    /// Timed publish bound.
    pub consumer_timeout: Option<Duration>,
    /// Payload decoding.
    pub decode: Option<DecodeMode>,
    /// Cancels the call and the stream it returns.
    pub cancellation: Option<CancellationToken>,
}

macro_rules! streaming_builders {
    ($options:ty) => {
        impl $options {
            /// Sets whether link records are resolved.
            #[must_use]
            pub fn with_resolve_links(mut self, resolve_links: bool) -> Self {
                self.streaming.resolve_links = Some(resolve_links);
                self
            }

            /// Sets the queue capacity.
            #[must_use]
            pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
                self.streaming.queue_capacity = Some(capacity);
                self
            }

            /// Sets the consumer timeout.
            #[must_use]
            pub fn with_consumer_timeout(mut self, timeout: Duration) -> Self {
                self.streaming.consumer_timeout = Some(timeout);
                self
            }

            /// Sets payload decoding.
            #[must_use]
            pub fn with_decode(mut self, decode: DecodeMode) -> Self {
                self.streaming.decode = Some(decode);
                self
            }

            /// Links the call to `cancellation`.
            #[must_use]
            pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
                self.streaming.cancellation = Some(cancellation);
                self
            }
        }
    };
}

/// Options of a stream read.
#[derive(Clone, Debug, Default)]
pub struct ReadStreamOptions {
    /// Starting revision.
    pub from: StreamPosition,
    /// Read direction.
    pub direction: Direction,
    /// Maximum number of records.
    pub max_count: Option<u64>,
    /// Request heartbeats.
    pub heartbeats: Option<bool>,
    /// Relay and decoding overrides.
    pub streaming: StreamingOptions,
}

impl ReadStreamOptions {
    /// Reads forwards from `from`.
    #[must_use]
    pub fn forwards_from(from: StreamPosition) -> Self {
        Self {
            from,
            ..Self::default()
        }
    }

    /// Reads backwards from `from`.
    #[must_use]
    pub fn backwards_from(from: StreamPosition) -> Self {
        Self {
            from,
            direction: Direction::Backwards,
            ..Self::default()
        }
    }

    /// Limits the number of records.
    #[must_use]
    pub fn with_max_count(mut self, max_count: u64) -> Self {
        self.max_count = Some(max_count);
        self
    }

    /// Sets whether heartbeats are requested.
    #[must_use]
    pub fn with_heartbeats(mut self, heartbeats: bool) -> Self {
        self.heartbeats = Some(heartbeats);
        self
    }
}

streaming_builders!(ReadStreamOptions);

/// Options of a log read.
#[derive(Clone, Debug, Default)]
pub struct ReadAllOptions {
    /// Starting position.
    pub from: LogPosition,
    /// Read direction.
    pub direction: Direction,
    /// Maximum number of records.
    pub max_count: Option<u64>,
    /// Server-side filter.
    pub filter: Option<RecordFilter>,
    /// Request heartbeats.
    pub heartbeats: Option<bool>,
    /// Relay and decoding overrides.
    pub streaming: StreamingOptions,
}

impl ReadAllOptions {
    /// Reads forwards from `from`.
    #[must_use]
    pub fn forwards_from(from: LogPosition) -> Self {
        Self {
            from,
            ..Self::default()
        }
    }

    /// Reads backwards from `from`.
    #[must_use]
    pub fn backwards_from(from: LogPosition) -> Self {
        Self {
            from,
            direction: Direction::Backwards,
            ..Self::default()
        }
    }

    /// Limits the number of records.
    #[must_use]
    pub fn with_max_count(mut self, max_count: u64) -> Self {
        self.max_count = Some(max_count);
        self
    }

    /// Filters records server-side.
    #[must_use]
    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sets whether heartbeats are requested.
    #[must_use]
    pub fn with_heartbeats(mut self, heartbeats: bool) -> Self {
        self.heartbeats = Some(heartbeats);
        self
    }
}

streaming_builders!(ReadAllOptions);

/// Options of a stream subscription.
#[derive(Clone, Debug, Default)]
pub struct SubscribeToStreamOptions {
    /// Where to start.
    pub from: SubscribeFrom,
    /// Relay and decoding overrides.
    pub streaming: StreamingOptions,
}

impl SubscribeToStreamOptions {
    /// Subscribes from `from`.
    #[must_use]
    pub fn starting(from: SubscribeFrom) -> Self {
        Self {
            from,
            ..Self::default()
        }
    }
}

streaming_builders!(SubscribeToStreamOptions);

/// Options of a log subscription.
#[derive(Clone, Debug, Default)]
pub struct SubscribeToAllOptions {
    /// Where to start.
    pub from: SubscribeFromLog,
    /// Server-side filter.
    pub filter: Option<RecordFilter>,
    /// Relay and decoding overrides.
    pub streaming: StreamingOptions,
}

impl SubscribeToAllOptions {
    /// Subscribes from `from`.
    #[must_use]
    pub fn starting(from: SubscribeFromLog) -> Self {
        Self {
            from,
            ..Self::default()
        }
    }

    /// Filters records server-side.
    #[must_use]
    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

streaming_builders!(SubscribeToAllOptions);
