//! Translation of wire frames into read messages.

mod heartbeat;
mod record;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use proven_eventlog::wire::current::ReadResponse;
use proven_eventlog::wire::legacy::ReadResp;
use proven_eventlog::{Decoder, WireFrame, WireTimestamp};

use crate::classify::{self, ServerFailure};
use crate::error::{Error, Result};
use crate::heartbeat::HeartbeatKind;
use crate::message::ReadMessage;

/// How payloads are decoded during translation.
#[derive(Clone)]
pub(crate) enum Decoding {
    Eager(Arc<dyn Decoder>),
    Skip,
}

impl fmt::Debug for Decoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eager(_) => f.write_str("Eager"),
            Self::Skip => f.write_str("Skip"),
        }
    }
}

/// What a frame turned into.
#[derive(Debug)]
pub(crate) enum Translated {
    Messages(Vec<ReadMessage>),
    Confirmed(String),
    Failed(ServerFailure),
    Ignored,
}

/// Translates a frame of either protocol generation.
pub(crate) fn translate(frame: WireFrame, decoding: &Decoding) -> Result<Translated> {
    match frame {
        WireFrame::Legacy(frame) => translate_legacy(frame, decoding),
        WireFrame::Current(frame) => translate_current(frame, decoding),
    }
}

fn translate_legacy(frame: ReadResp, decoding: &Decoding) -> Result<Translated> {
    let message = match frame {
        ReadResp::Event(event) => ReadMessage::Record(record::from_legacy(event, decoding)?),
        ReadResp::Checkpoint {
            commit_position,
            prepare_position,
            timestamp,
        } => ReadMessage::Heartbeat(heartbeat::legacy_checkpoint(
            commit_position,
            prepare_position,
            timestamp,
        )),
        ReadResp::CaughtUp {
            timestamp,
            stream_revision,
            position,
        } => ReadMessage::Heartbeat(heartbeat::legacy(
            HeartbeatKind::CaughtUp,
            timestamp,
            stream_revision,
            position,
        )),
        ReadResp::FellBehind {
            timestamp,
            stream_revision,
            position,
        } => ReadMessage::Heartbeat(heartbeat::legacy(
            HeartbeatKind::FellBehind,
            timestamp,
            stream_revision,
            position,
        )),
        ReadResp::Confirmation { subscription_id } => {
            return Ok(Translated::Confirmed(subscription_id));
        }
        ReadResp::StreamNotFound { .. } => return Ok(Translated::Failed(ServerFailure::NotFound)),
        ReadResp::FirstStreamPosition(_)
        | ReadResp::LastStreamPosition(_)
        | ReadResp::LastAllStreamPosition { .. } => return Ok(Translated::Ignored),
    };

    Ok(Translated::Messages(vec![message]))
}

fn translate_current(frame: ReadResponse, decoding: &Decoding) -> Result<Translated> {
    match frame {
        ReadResponse::Records(batch) => batch
            .into_iter()
            .map(|wire| record::from_current(wire, decoding).map(ReadMessage::Record))
            .collect::<Result<Vec<_>>>()
            .map(Translated::Messages),
        ReadResponse::Heartbeat {
            kind,
            position,
            stream_revision,
            timestamp,
        } => Ok(Translated::Messages(vec![ReadMessage::Heartbeat(
            heartbeat::current(kind, position, stream_revision, timestamp),
        )])),
        ReadResponse::Failure { kind, .. } => Ok(Translated::Failed(classify::failure_kind(kind))),
        ReadResponse::SubscriptionConfirmed { subscription_id } => {
            Ok(Translated::Confirmed(subscription_id))
        }
    }
}

fn to_datetime(timestamp: WireTimestamp) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.seconds, timestamp.nanos)
}

fn malformed(message: impl Into<String>) -> Error {
    Error::MalformedFrame(message.into())
}
