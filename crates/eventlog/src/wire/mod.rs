//! Wire frames of both read/subscribe protocol generations.

pub mod current;
pub mod legacy;

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Number of legacy 100 ns ticks in a second.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

const NANOS_PER_TICK: i64 = 100;

/// Protocol generation spoken by a server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// One record per frame, failures as statuses.
    Legacy,
    /// Batched records, failures as frames.
    #[default]
    Current,
}

/// Seconds and nanoseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WireTimestamp {
    /// Whole seconds.
    pub seconds: i64,
    /// Sub-second nanoseconds.
    pub nanos: u32,
}

impl WireTimestamp {
    /// Creates a timestamp.
    #[must_use]
    pub const fn new(seconds: i64, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    /// The current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| {
                Self::new(
                    i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX),
                    elapsed.subsec_nanos(),
                )
            })
            .unwrap_or_default()
    }

    /// Converts legacy 100 ns ticks since the Unix epoch.
    #[must_use]
    pub const fn from_ticks(ticks: i64) -> Self {
        let seconds = ticks.div_euclid(TICKS_PER_SECOND);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let nanos = (ticks.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK) as u32;
        Self { seconds, nanos }
    }

    /// Converts to legacy 100 ns ticks since the Unix epoch.
    #[must_use]
    pub const fn to_ticks(self) -> i64 {
        self.seconds * TICKS_PER_SECOND + self.nanos as i64 / NANOS_PER_TICK
    }
}

/// A raw frame from either protocol generation.
#[derive(Clone, Debug, PartialEq)]
pub enum WireFrame {
    /// Legacy protocol frame.
    Legacy(legacy::ReadResp),
    /// Current protocol frame.
    Current(current::ReadResponse),
}

impl From<legacy::ReadResp> for WireFrame {
    fn from(frame: legacy::ReadResp) -> Self {
        Self::Legacy(frame)
    }
}

impl From<current::ReadResponse> for WireFrame {
    fn from(frame: current::ReadResponse) -> Self {
        Self::Current(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_conversion() {
        let timestamp = WireTimestamp::new(1_700_000_000, 123_456_700);

        assert_eq!(timestamp.to_ticks(), 17_000_000_001_234_567);
        assert_eq!(WireTimestamp::from_ticks(timestamp.to_ticks()), timestamp);
    }

    #[test]
    fn test_ticks_before_epoch() {
        let timestamp = WireTimestamp::from_ticks(-5);

        assert_eq!(timestamp.seconds, -1);
        assert_eq!(timestamp.nanos, 999_999_500);
    }
}
