use std::sync::Arc;

use proven_eventlog::wire::current::{FailureKind, HeartbeatKind};
use proven_eventlog::{
    ALL_STREAM, Direction, LogPosition, ReadRequest, ReadTarget, RecordFilter, Status, StatusCode,
    StreamName, StreamPosition,
};

use crate::encode::{Item, WireEncoder};
use crate::filter::CompiledFilter;
use crate::state::{LogState, StoredRecord, StreamAccess};

/// Every frame a finite read produces, in order.
pub(crate) fn read_frames(
    state: &LogState,
    request: &ReadRequest,
    encoder: WireEncoder,
) -> Vec<Item> {
    match &request.target {
        ReadTarget::Stream { stream, from } => read_stream(state, stream, *from, request, encoder),
        ReadTarget::All { from, filter } => {
            read_all(state, *from, filter.as_ref(), request, encoder)
        }
    }
}

fn limit(max_count: Option<u64>) -> usize {
    max_count.map_or(usize::MAX, |count| {
        usize::try_from(count).unwrap_or(usize::MAX)
    })
}

fn read_stream(
    state: &LogState,
    stream: &StreamName,
    from: StreamPosition,
    request: &ReadRequest,
    encoder: WireEncoder,
) -> Vec<Item> {
    let records = match state.access(stream) {
        StreamAccess::Denied => return vec![encoder.failure(FailureKind::AccessDenied, stream)],
        StreamAccess::Tombstoned => {
            return vec![encoder.failure(FailureKind::StreamTombstoned, stream)];
        }
        StreamAccess::Missing => return vec![encoder.failure(FailureKind::StreamNotFound, stream)],
        StreamAccess::Visible(records) => records,
    };

    let first_revision = records.first().map(|record| record.revision);
    let last_revision = records.last().map(|record| record.revision);

    let selected: Vec<&Arc<StoredRecord>> = match request.direction {
        Direction::Forwards => records
            .iter()
            .filter(|record| match from {
                StreamPosition::Start => true,
                StreamPosition::End => false,
                StreamPosition::Revision(revision) => record.revision >= revision,
            })
            .take(limit(request.max_count))
            .collect(),
        Direction::Backwards => records
            .iter()
            .rev()
            .filter(|record| match from {
                StreamPosition::Start => Some(record.revision) == first_revision,
                StreamPosition::End => true,
                StreamPosition::Revision(revision) => record.revision <= revision,
            })
            .take(limit(request.max_count))
            .collect(),
    };

    let mut frames = encoder.records(
        selected
            .into_iter()
            .map(|record| state.resolve(record, request.resolve_links))
            .collect(),
    );
    frames.extend(encoder.last_stream_position(last_revision));
    if request.heartbeats {
        frames.push(encoder.heartbeat(HeartbeatKind::CaughtUp, None, last_revision));
    }

    frames
}

fn read_all(
    state: &LogState,
    from: LogPosition,
    filter: Option<&RecordFilter>,
    request: &ReadRequest,
    encoder: WireEncoder,
) -> Vec<Item> {
    let log_stream = StreamName::from(ALL_STREAM);
    if state.is_denied(&log_stream) {
        return vec![encoder.failure(FailureKind::AccessDenied, &log_stream)];
    }

    let filter = match filter.map(CompiledFilter::compile).transpose() {
        Ok(filter) => filter,
        Err(e) => {
            return vec![Err(Status::new(
                StatusCode::InvalidArgument,
                format!("invalid filter: {e}"),
            )
            .into())];
        }
    };

    let scan: Box<dyn Iterator<Item = &Arc<StoredRecord>>> = match (request.direction, from) {
        (Direction::Forwards, LogPosition::Start) => Box::new(state.log.iter()),
        (Direction::Backwards, LogPosition::End) => Box::new(state.log.iter().rev()),
        (Direction::Forwards, LogPosition::End) | (Direction::Backwards, LogPosition::Start) => {
            Box::new(std::iter::empty())
        }
        (Direction::Forwards, LogPosition::At(position)) => Box::new(
            state
                .log
                .iter()
                .filter(move |record| record.position >= position.commit),
        ),
        (Direction::Backwards, LogPosition::At(position)) => Box::new(
            state
                .log
                .iter()
                .rev()
                .filter(move |record| record.position <= position.commit),
        ),
    };

    let limit = limit(request.max_count);
    let mut frames = Vec::new();
    let mut batch = Vec::new();
    let mut matched = 0;
    let mut last_scanned = None;

    for (scanned, record) in scan.enumerate() {
        if matched >= limit {
            break;
        }
        last_scanned = Some(record.position);

        if filter.as_ref().is_none_or(|filter| filter.matches(record)) {
            batch.push(state.resolve(record, request.resolve_links));
            matched += 1;
        }

        let checkpoint_due = filter
            .as_ref()
            .is_some_and(|filter| filter.checkpoint_due(scanned + 1));
        if request.heartbeats && checkpoint_due {
            frames.extend(encoder.records(std::mem::take(&mut batch)));
            frames.push(encoder.heartbeat(HeartbeatKind::Checkpoint, Some(record.position), None));
        }
    }

    frames.extend(encoder.records(batch));
    if request.heartbeats {
        let position = last_scanned.or_else(|| state.log.last().map(|record| record.position));
        frames.push(encoder.heartbeat(HeartbeatKind::CaughtUp, position, None));
    }

    frames
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use proven_eventlog::wire::current::ReadResponse;
    use proven_eventlog::wire::legacy::ReadResp;
    use proven_eventlog::{
        DataFormat, ExpectedRevision, ProposedRecord, ProtocolVersion, SchemaInfo, TransportError,
        WireFrame,
    };

    use super::*;

    fn seeded() -> LogState {
        let mut state = LogState::default();
        for (stream, count) in [("order-1", 5), ("user-1", 3)] {
            let records = (0..count)
                .map(|i| {
                    ProposedRecord::new(
                        SchemaInfo::new("Tick", DataFormat::Json),
                        format!("{{\"i\":{i}}}"),
                    )
                })
                .collect();
            state
                .append(&StreamName::from(stream), ExpectedRevision::Any, records)
                .unwrap();
        }
        state
    }

    fn stream_request(
        from: StreamPosition,
        direction: Direction,
        max_count: Option<u64>,
    ) -> ReadRequest {
        ReadRequest {
            target: ReadTarget::Stream {
                stream: StreamName::from("order-1"),
                from,
            },
            direction,
            max_count,
            resolve_links: false,
            heartbeats: true,
        }
    }

    fn revisions(frames: &[Item]) -> Vec<u64> {
        frames
            .iter()
            .filter_map(|frame| match frame {
                Ok(WireFrame::Current(ReadResponse::Records(records))) => Some(records),
                _ => None,
            })
            .flatten()
            .map(|record| record.stream_revision)
            .collect()
    }

    #[test]
    fn test_forwards_from_revision() {
        let encoder = WireEncoder::new(ProtocolVersion::Current, false);

        let frames = read_frames(
            &seeded(),
            &stream_request(StreamPosition::Revision(2), Direction::Forwards, None),
            encoder,
        );

        assert_eq!(revisions(&frames), vec![2, 3, 4]);
        assert_matches!(
            frames.last(),
            Some(Ok(WireFrame::Current(ReadResponse::Heartbeat {
                kind: HeartbeatKind::CaughtUp,
                stream_revision: Some(4),
                ..
            })))
        );
    }

    #[test]
    fn test_backwards_from_end() {
        let encoder = WireEncoder::new(ProtocolVersion::Current, false);

        let frames = read_frames(
            &seeded(),
            &stream_request(StreamPosition::End, Direction::Backwards, Some(1)),
            encoder,
        );

        assert_eq!(revisions(&frames), vec![4]);
    }

    #[test]
    fn test_legacy_missing_stream() {
        let encoder = WireEncoder::new(ProtocolVersion::Legacy, false);
        let mut request = stream_request(StreamPosition::Start, Direction::Forwards, None);
        request.target = ReadTarget::Stream {
            stream: StreamName::from("nope"),
            from: StreamPosition::Start,
        };

        let frames = read_frames(&seeded(), &request, encoder);

        assert_eq!(frames.len(), 1);
        assert_matches!(
            &frames[0],
            Ok(WireFrame::Legacy(ReadResp::StreamNotFound { stream_identifier })) if stream_identifier == "nope"
        );
    }

    #[test]
    fn test_filtered_log_read_checkpoints() {
        let encoder = WireEncoder::new(ProtocolVersion::Current, false);
        let request = ReadRequest {
            target: ReadTarget::All {
                from: LogPosition::Start,
                filter: Some(RecordFilter::stream_prefixes(["user-"]).with_checkpoint_interval(4)),
            },
            direction: Direction::Forwards,
            max_count: None,
            resolve_links: false,
            heartbeats: true,
        };

        let frames = read_frames(&seeded(), &request, encoder);

        let checkpoints: Vec<_> = frames
            .iter()
            .filter_map(|frame| match frame {
                Ok(WireFrame::Current(ReadResponse::Heartbeat {
                    kind: HeartbeatKind::Checkpoint,
                    position,
                    ..
                })) => *position,
                _ => None,
            })
            .collect();
        assert_eq!(checkpoints, vec![3, 7]);

        let streams: Vec<_> = frames
            .iter()
            .filter_map(|frame| match frame {
                Ok(WireFrame::Current(ReadResponse::Records(records))) => Some(records.clone()),
                _ => None,
            })
            .flatten()
            .map(|record| record.stream)
            .collect();
        assert_eq!(streams, vec!["user-1"; 3]);
    }

    #[test]
    fn test_invalid_filter() {
        let encoder = WireEncoder::new(ProtocolVersion::Current, false);
        let request = ReadRequest {
            target: ReadTarget::All {
                from: LogPosition::Start,
                filter: Some(RecordFilter::stream_regex("[")),
            },
            direction: Direction::Forwards,
            max_count: None,
            resolve_links: false,
            heartbeats: false,
        };

        let frames = read_frames(&seeded(), &request, encoder);

        assert_matches!(
            &frames[..],
            [Err(TransportError::Status(status))] if status.code == StatusCode::InvalidArgument
        );
    }
}
