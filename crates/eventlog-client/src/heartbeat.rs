use chrono::{DateTime, Utc};
use proven_eventlog::Position;

/// Kind of a heartbeat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HeartbeatKind {
    /// Progress marker of a filtered read.
    Checkpoint,
    /// The consumer reached the live edge.
    CaughtUp,
    /// The consumer fell behind the live edge.
    FellBehind,
}

/// A progress signal interleaved with records. Never carries data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Heartbeat {
    /// Heartbeat kind.
    pub kind: HeartbeatKind,
    /// Log position, when the server reported one.
    pub position: Option<Position>,
    /// Stream revision, when the server reported one.
    pub revision: Option<u64>,
    /// When the server produced the heartbeat.
    pub timestamp: Option<DateTime<Utc>>,
}

impl Heartbeat {
    /// Whether this is a checkpoint.
    #[must_use]
    pub const fn is_checkpoint(&self) -> bool {
        matches!(self.kind, HeartbeatKind::Checkpoint)
    }

    /// Whether this is a caught-up signal.
    #[must_use]
    pub const fn is_caught_up(&self) -> bool {
        matches!(self.kind, HeartbeatKind::CaughtUp)
    }

    /// Whether this is a fell-behind signal.
    #[must_use]
    pub const fn is_fell_behind(&self) -> bool {
        matches!(self.kind, HeartbeatKind::FellBehind)
    }
}
