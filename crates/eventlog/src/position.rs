use std::fmt;

use serde::{Deserialize, Serialize};

/// Global position of a record in the log.
///
/// Ordered by commit position first, then prepare position.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    /// Commit position.
    pub commit: u64,
    /// Prepare position.
    pub prepare: u64,
}

impl Position {
    /// The beginning of the log.
    pub const START: Self = Self {
        commit: 0,
        prepare: 0,
    };

    /// The end of the log.
    pub const END: Self = Self {
        commit: u64::MAX,
        prepare: u64::MAX,
    };

    /// Creates a position.
    #[must_use]
    pub const fn new(commit: u64, prepare: u64) -> Self {
        Self { commit, prepare }
    }

    /// Position for protocols that expose a single log offset.
    #[must_use]
    pub const fn from_offset(offset: u64) -> Self {
        Self {
            commit: offset,
            prepare: offset,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C:{}/P:{}", self.commit, self.prepare)
    }
}

/// Where a stream-scoped read starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamPosition {
    /// First record of the stream.
    #[default]
    Start,
    /// Last record of the stream.
    End,
    /// A specific revision (inclusive).
    Revision(u64),
}

/// Where a log-wide read starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogPosition {
    /// Beginning of the log.
    #[default]
    Start,
    /// End of the log.
    End,
    /// A specific position (inclusive).
    At(Position),
}

/// Read direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Oldest to newest.
    #[default]
    Forwards,
    /// Newest to oldest.
    Backwards,
}

/// Where a stream subscription starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscribeFrom {
    /// Replay the whole stream, then go live.
    #[default]
    Start,
    /// Only records appended after the subscription is confirmed.
    End,
    /// Records after the given revision (exclusive).
    After(u64),
}

/// Where a log-wide subscription starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscribeFromLog {
    /// Replay the whole log, then go live.
    #[default]
    Start,
    /// Only records committed after the subscription is confirmed.
    End,
    /// Records after the given position (exclusive).
    After(Position),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_ordering() {
        assert!(Position::START < Position::new(1, 0));
        assert!(Position::new(1, 0) < Position::new(1, 1));
        assert!(Position::new(5, 9) < Position::new(6, 0));
        assert!(Position::new(6, 0) < Position::END);
    }

    #[test]
    fn test_position_display() {
        assert_eq!(Position::new(12, 10).to_string(), "C:12/P:10");
    }
}
