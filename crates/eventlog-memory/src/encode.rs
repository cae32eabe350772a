use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use proven_eventlog::wire::current::{self, FailureKind, HeartbeatKind, LinkRef, ReadResponse};
use proven_eventlog::wire::legacy::{self, ReadEvent, ReadResp, RecordedEvent};
use proven_eventlog::{
    ProtocolVersion, Status, StatusCode, StreamName, TransportError, WireFrame, WireTimestamp,
    exceptions,
};

use crate::state::{Resolved, StoredRecord};

/// Records per frame of the current protocol.
pub const CURRENT_BATCH_SIZE: usize = 16;

/// What a session yields.
pub(crate) type Item = Result<WireFrame, TransportError>;

/// Renders log contents as frames of one protocol generation.
#[derive(Clone, Copy, Debug)]
pub(crate) struct WireEncoder {
    protocol: ProtocolVersion,
    conflate_tombstone_errors: bool,
}

impl WireEncoder {
    pub(crate) const fn new(protocol: ProtocolVersion, conflate_tombstone_errors: bool) -> Self {
        Self {
            protocol,
            conflate_tombstone_errors,
        }
    }

    pub(crate) fn records(&self, records: Vec<Resolved>) -> Vec<Item> {
        match self.protocol {
            ProtocolVersion::Legacy => records
                .into_iter()
                .map(|resolved| Ok(ReadResp::Event(legacy_event(&resolved)).into()))
                .collect(),
            ProtocolVersion::Current => {
                let records: Vec<_> = records.iter().map(current_record).collect();

                records
                    .chunks(CURRENT_BATCH_SIZE)
                    .map(|batch| Ok(ReadResponse::Records(batch.to_vec()).into()))
                    .collect()
            }
        }
    }

    pub(crate) fn heartbeat(
        &self,
        kind: HeartbeatKind,
        position: Option<u64>,
        stream_revision: Option<u64>,
    ) -> Item {
        let timestamp = Some(WireTimestamp::now());

        let frame: WireFrame = match self.protocol {
            ProtocolVersion::Legacy => {
                let pair = position.map(|position| (position, position));
                match kind {
                    HeartbeatKind::Checkpoint => ReadResp::Checkpoint {
                        commit_position: position.unwrap_or_default(),
                        prepare_position: position.unwrap_or_default(),
                        timestamp,
                    },
                    HeartbeatKind::CaughtUp => ReadResp::CaughtUp {
                        timestamp,
                        stream_revision,
                        position: pair,
                    },
                    HeartbeatKind::FellBehind => ReadResp::FellBehind {
                        timestamp,
                        stream_revision,
                        position: pair,
                    },
                }
                .into()
            }
            ProtocolVersion::Current => ReadResponse::Heartbeat {
                kind,
                position,
                stream_revision,
                timestamp,
            }
            .into(),
        };

        Ok(frame)
    }

    /// A read failure. The legacy protocol reports everything but a missing
    /// stream as a transport status.
    pub(crate) fn failure(&self, kind: FailureKind, stream: &StreamName) -> Item {
        match self.protocol {
            ProtocolVersion::Current => Ok(ReadResponse::Failure {
                kind,
                stream: Some(stream.to_string()),
            }
            .into()),
            ProtocolVersion::Legacy => match kind {
                FailureKind::StreamNotFound => Ok(ReadResp::StreamNotFound {
                    stream_identifier: stream.to_string(),
                }
                .into()),
                FailureKind::AccessDenied => Err(Status::new(
                    StatusCode::PermissionDenied,
                    format!("read access to '{stream}' denied"),
                )
                .with_exception(exceptions::ACCESS_DENIED)
                .into()),
                FailureKind::StreamDeleted | FailureKind::StreamTombstoned => {
                    let exception = if self.conflate_tombstone_errors {
                        exceptions::WRONG_EXPECTED_VERSION
                    } else {
                        exceptions::STREAM_DELETED
                    };

                    Err(Status::new(
                        StatusCode::FailedPrecondition,
                        format!("stream '{stream}' is deleted"),
                    )
                    .with_exception(exception)
                    .into())
                }
            },
        }
    }

    pub(crate) fn confirmation(&self, subscription_id: String) -> Item {
        Ok(match self.protocol {
            ProtocolVersion::Legacy => ReadResp::Confirmation { subscription_id }.into(),
            ProtocolVersion::Current => {
                ReadResponse::SubscriptionConfirmed { subscription_id }.into()
            }
        })
    }

    /// Trailing frame of a legacy stream read.
    pub(crate) fn last_stream_position(&self, revision: Option<u64>) -> Option<Item> {
        match (self.protocol, revision) {
            (ProtocolVersion::Legacy, Some(revision)) => {
                Some(Ok(ReadResp::LastStreamPosition(revision).into()))
            }
            _ => None,
        }
    }
}

fn legacy_event(resolved: &Resolved) -> ReadEvent {
    match resolved {
        Resolved::Record(record) => ReadEvent {
            event: Some(recorded_event(record)),
            link: None,
            commit_position: Some(record.position),
        },
        Resolved::Link { link, target } => ReadEvent {
            event: target.as_deref().map(recorded_event),
            link: Some(recorded_event(link)),
            commit_position: Some(link.position),
        },
    }
}

fn recorded_event(record: &StoredRecord) -> RecordedEvent {
    let metadata = HashMap::from([
        (legacy::TYPE_KEY.to_string(), record.schema.name.clone()),
        (
            legacy::CONTENT_TYPE_KEY.to_string(),
            record.schema.format.content_type().to_string(),
        ),
        (
            legacy::CREATED_KEY.to_string(),
            record.created.to_ticks().to_string(),
        ),
    ]);

    let custom_metadata = if record.properties.is_empty() {
        Bytes::new()
    } else {
        serde_json::to_vec(&record.properties).map_or_else(|_| Bytes::new(), Bytes::from)
    };

    RecordedEvent {
        id: record.id,
        stream_identifier: record.stream.to_string(),
        stream_revision: record.revision,
        prepare_position: record.position,
        commit_position: record.position,
        metadata,
        custom_metadata,
        data: record.data.clone(),
    }
}

fn current_record(resolved: &Resolved) -> current::Record {
    match resolved {
        Resolved::Record(record) => stored_to_current(record, None),
        Resolved::Link {
            link,
            target: Some(target),
        } => stored_to_current(
            target,
            Some(LinkRef {
                stream: link.stream.to_string(),
                stream_revision: link.revision,
                position: link.position,
            }),
        ),
        // A dangling link is delivered as the link record itself.
        Resolved::Link { link, target: None } => stored_to_current(link, None),
    }
}

fn stored_to_current(record: &Arc<StoredRecord>, link: Option<LinkRef>) -> current::Record {
    current::Record {
        record_id: record.id,
        stream: record.stream.to_string(),
        stream_revision: record.revision,
        position: record.position,
        timestamp: record.created,
        schema: record.schema.clone(),
        properties: record.properties.clone(),
        data: record.data.clone(),
        link,
        index_revision: None,
    }
}
