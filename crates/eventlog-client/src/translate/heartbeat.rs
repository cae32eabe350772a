use proven_eventlog::wire::current::HeartbeatKind as WireHeartbeatKind;
use proven_eventlog::{Position, WireTimestamp};

use super::to_datetime;
use crate::heartbeat::{Heartbeat, HeartbeatKind};

pub(super) fn legacy_checkpoint(
    commit_position: u64,
    prepare_position: u64,
    timestamp: Option<WireTimestamp>,
) -> Heartbeat {
    Heartbeat {
        kind: HeartbeatKind::Checkpoint,
        position: Some(Position::new(commit_position, prepare_position)),
        revision: None,
        timestamp: timestamp.and_then(to_datetime),
    }
}

pub(super) fn legacy(
    kind: HeartbeatKind,
    timestamp: Option<WireTimestamp>,
    stream_revision: Option<u64>,
    position: Option<(u64, u64)>,
) -> Heartbeat {
    Heartbeat {
        kind,
        position: position.map(|(commit, prepare)| Position::new(commit, prepare)),
        revision: stream_revision,
        timestamp: timestamp.and_then(to_datetime),
    }
}

pub(super) fn current(
    kind: WireHeartbeatKind,
    position: Option<u64>,
    stream_revision: Option<u64>,
    timestamp: Option<WireTimestamp>,
) -> Heartbeat {
    let kind = match kind {
        WireHeartbeatKind::Checkpoint => HeartbeatKind::Checkpoint,
        WireHeartbeatKind::CaughtUp => HeartbeatKind::CaughtUp,
        WireHeartbeatKind::FellBehind => HeartbeatKind::FellBehind,
    };

    Heartbeat {
        kind,
        position: position.map(Position::from_offset),
        revision: stream_revision,
        timestamp: timestamp.and_then(to_datetime),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_caught_up() {
        let heartbeat = legacy(
            HeartbeatKind::CaughtUp,
            Some(WireTimestamp::new(1_700_000_000, 0)),
            Some(4),
            Some((120, 118)),
        );

        assert!(heartbeat.is_caught_up());
        assert_eq!(heartbeat.revision, Some(4));
        assert_eq!(heartbeat.position, Some(Position::new(120, 118)));
        assert_eq!(
            heartbeat.timestamp.map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
    }

    #[test]
    fn test_legacy_checkpoint() {
        let heartbeat = legacy_checkpoint(64, 60, None);

        assert!(heartbeat.is_checkpoint());
        assert_eq!(heartbeat.position, Some(Position::new(64, 60)));
        assert_eq!(heartbeat.revision, None);
        assert_eq!(heartbeat.timestamp, None);
    }

    #[test]
    fn test_current_checkpoint() {
        let heartbeat = current(WireHeartbeatKind::Checkpoint, Some(32), None, None);

        assert!(heartbeat.is_checkpoint());
        assert_eq!(heartbeat.position, Some(Position::from_offset(32)));
    }
}
