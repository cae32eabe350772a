use std::sync::Arc;

use proven_eventlog::wire::current::{FailureKind, HeartbeatKind};
use proven_eventlog::{
    ALL_STREAM, Status, StatusCode, StreamName, SubscribeFrom, SubscribeFromLog, SubscribeRequest,
    SubscribeTarget,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::MemoryEventLog;
use crate::encode::{Item, WireEncoder};
use crate::filter::CompiledFilter;
use crate::state::{LogState, Resolved, StoredRecord};

/// The broadcast channel appended records are published on.
pub(crate) type LiveSender = broadcast::Sender<Arc<StoredRecord>>;

/// Which records a subscription delivers.
enum Selection {
    Stream {
        stream: StreamName,
        after: Option<u64>,
    },
    All {
        after: Option<u64>,
        filter: Option<CompiledFilter>,
    },
}

impl Selection {
    fn matches(&self, record: &StoredRecord) -> bool {
        match self {
            Self::Stream { stream, after } => {
                record.stream == *stream && after.is_none_or(|after| record.revision > after)
            }
            Self::All { after, filter } => {
                after.is_none_or(|after| record.position > after)
                    && filter.as_ref().is_none_or(|filter| filter.matches(record))
            }
        }
    }
}

/// A history entry: a record to deliver or a scan checkpoint.
enum Replayed {
    Record(Resolved),
    Checkpoint(u64),
}

/// Pushes frames into a session until cancelled or the session is dropped.
pub(crate) async fn send(
    sender: &mpsc::Sender<Item>,
    cancellation: &CancellationToken,
    item: Item,
) -> bool {
    tokio::select! {
        biased;
        () = cancellation.cancelled() => false,
        sent = sender.send(item) => sent.is_ok(),
    }
}

/// Feeds a subscription session: confirmation, history, a caught-up
/// heartbeat, then live records until cancelled.
pub(crate) async fn run_subscription(
    log: MemoryEventLog,
    request: SubscribeRequest,
    encoder: WireEncoder,
    sender: mpsc::Sender<Item>,
    cancellation: CancellationToken,
) {
    let opened = {
        let state = log.state().read();

        select(&state, &request, encoder).map(|selection| {
            let skip_history = matches!(
                request.target,
                SubscribeTarget::Stream {
                    from: SubscribeFrom::End,
                    ..
                } | SubscribeTarget::All {
                    from: SubscribeFromLog::End,
                    ..
                }
            );
            let history = if skip_history {
                Vec::new()
            } else {
                catch_up(&state, &selection, 0, &request)
            };

            // Subscribing under the read lock leaves no gap between history and live.
            let live = log.live().subscribe();
            (selection, state.log.len() as u64, history, live)
        })
    };

    let (selection, mut next_position, history, mut live) = match opened {
        Ok(opened) => opened,
        Err(item) => {
            send(&sender, &cancellation, item).await;
            return;
        }
    };

    let subscription_id = Uuid::new_v4().to_string();
    debug!("subscription {} confirmed", subscription_id);

    let confirmation = encoder.confirmation(subscription_id.clone());
    if !send(&sender, &cancellation, confirmation).await {
        return;
    }
    if !deliver(&sender, &cancellation, encoder, history, next_position).await {
        return;
    }

    loop {
        let received = tokio::select! {
            biased;
            () = cancellation.cancelled() => break,
            received = live.recv() => received,
        };

        match received {
            Ok(record) => {
                if record.position < next_position {
                    continue;
                }
                next_position = record.position + 1;

                if selection.matches(&record) {
                    let resolved = log.state().read().resolve(&record, request.resolve_links);
                    for item in encoder.records(vec![resolved]) {
                        if !send(&sender, &cancellation, item).await {
                            return;
                        }
                    }
                }
            }
            Err(RecvError::Lagged(missed)) => {
                debug!(
                    "subscription {} fell behind by {} records",
                    subscription_id, missed
                );

                let fell_behind =
                    encoder.heartbeat(HeartbeatKind::FellBehind, Some(next_position), None);
                if !send(&sender, &cancellation, fell_behind).await {
                    return;
                }

                let (history, end) = {
                    let state = log.state().read();
                    (
                        catch_up(&state, &selection, next_position, &request),
                        state.log.len() as u64,
                    )
                };
                next_position = end;

                if !deliver(&sender, &cancellation, encoder, history, next_position).await {
                    return;
                }
            }
            Err(RecvError::Closed) => break,
        }
    }

    debug!("subscription {} ended", subscription_id);
}

fn select(
    state: &LogState,
    request: &SubscribeRequest,
    encoder: WireEncoder,
) -> Result<Selection, Item> {
    match &request.target {
        SubscribeTarget::Stream { stream, from } => {
            if state.is_denied(stream) {
                return Err(encoder.failure(FailureKind::AccessDenied, stream));
            }
            if state.is_tombstoned(stream) {
                return Err(encoder.failure(FailureKind::StreamTombstoned, stream));
            }

            Ok(Selection::Stream {
                stream: stream.clone(),
                after: match from {
                    SubscribeFrom::After(revision) => Some(*revision),
                    SubscribeFrom::Start | SubscribeFrom::End => None,
                },
            })
        }
        SubscribeTarget::All { from, filter } => {
            let log_stream = StreamName::from(ALL_STREAM);
            if state.is_denied(&log_stream) {
                return Err(encoder.failure(FailureKind::AccessDenied, &log_stream));
            }

            let filter = match filter.as_ref().map(CompiledFilter::compile).transpose() {
                Ok(filter) => filter,
                Err(e) => {
                    return Err(Err(Status::new(
                        StatusCode::InvalidArgument,
                        format!("invalid filter: {e}"),
                    )
                    .into()));
                }
            };

            Ok(Selection::All {
                after: match from {
                    SubscribeFromLog::After(position) => Some(position.commit),
                    SubscribeFromLog::Start | SubscribeFromLog::End => None,
                },
                filter,
            })
        }
    }
}

/// Matching records at or past `from`, with the heartbeats a filtered
/// subscription reports while scanning.
fn catch_up(
    state: &LogState,
    selection: &Selection,
    from: u64,
    request: &SubscribeRequest,
) -> Vec<Replayed> {
    let filter = match selection {
        Selection::All {
            filter: Some(filter),
            ..
        } => Some(filter),
        _ => None,
    };

    let mut replayed = Vec::new();
    for (scanned, record) in state
        .log
        .iter()
        .filter(|record| record.position >= from)
        .enumerate()
    {
        if selection.matches(record) {
            replayed.push(Replayed::Record(state.resolve(record, request.resolve_links)));
        }
        if filter.is_some_and(|filter| filter.checkpoint_due(scanned + 1)) {
            replayed.push(Replayed::Checkpoint(record.position));
        }
    }

    replayed
}

async fn deliver(
    sender: &mpsc::Sender<Item>,
    cancellation: &CancellationToken,
    encoder: WireEncoder,
    history: Vec<Replayed>,
    live_edge: u64,
) -> bool {
    let mut batch = Vec::new();
    let mut items = Vec::new();

    for replayed in history {
        match replayed {
            Replayed::Record(resolved) => batch.push(resolved),
            Replayed::Checkpoint(position) => {
                items.extend(encoder.records(std::mem::take(&mut batch)));
                items.push(encoder.heartbeat(HeartbeatKind::Checkpoint, Some(position), None));
            }
        }
    }
    items.extend(encoder.records(batch));
    items.push(encoder.heartbeat(
        HeartbeatKind::CaughtUp,
        live_edge.checked_sub(1),
        None,
    ));

    for item in items {
        if !send(sender, cancellation, item).await {
            return false;
        }
    }

    true
}
