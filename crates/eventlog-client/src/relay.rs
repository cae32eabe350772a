//! The background task pumping a wire session into a message stream's queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use proven_eventlog::{StreamName, TransportError, WireFrame, WireSession};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use crate::classify;
use crate::error::Error;
use crate::message::ReadMessage;
use crate::settings::RelaySettings;
use crate::translate::{self, Decoding, Translated};

/// Why a relay stopped.
#[derive(Debug)]
enum Exit {
    /// The session ran out of frames.
    Exhausted,
    /// The cancellation token fired.
    Cancelled,
    /// The consumer dropped the queue.
    Abandoned,
    /// The relay faulted.
    Faulted(Error),
}

/// Drains a wire session into a bounded queue.
///
/// The relay owns the session. Its drop guard cancels the session token on
/// every exit path, and dropping the relay closes the queue.
pub(crate) struct MessageRelay<S> {
    session: S,
    pending: Option<WireFrame>,
    target: StreamName,
    sender: mpsc::Sender<ReadMessage>,
    settings: RelaySettings,
    decoding: Decoding,
    cancellation: CancellationToken,
    queued: Arc<AtomicUsize>,
    _session_guard: DropGuard,
}

impl<S> MessageRelay<S>
where
    S: WireSession,
{
    /// Creates a relay. `pending` is a frame already pulled from the
    /// session, relayed before any other.
    pub(crate) fn new(
        session: S,
        pending: Option<WireFrame>,
        target: StreamName,
        sender: mpsc::Sender<ReadMessage>,
        settings: RelaySettings,
        decoding: Decoding,
        queued: Arc<AtomicUsize>,
    ) -> Self {
        let cancellation = session.cancellation().clone();
        let session_guard = cancellation.clone().drop_guard();

        Self {
            session,
            pending,
            target,
            sender,
            settings,
            decoding,
            cancellation,
            queued,
            _session_guard: session_guard,
        }
    }

    /// Runs until the session is exhausted, cancelled, abandoned or faulted.
    /// Returns the fault, if any.
    pub(crate) async fn run(mut self) -> Option<Error> {
        debug!(
            "relay for '{}' started (capacity {}, consumer timeout {:?})",
            self.target, self.settings.queue_capacity, self.settings.consumer_timeout
        );

        let mut relayed = 0usize;
        let exit = 'relay: loop {
            let frame = match self.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => break Exit::Exhausted,
                Err(exit) => break exit,
            };

            let messages = match translate::translate(frame, &self.decoding) {
                Ok(Translated::Messages(messages)) => messages,
                Ok(Translated::Confirmed(_) | Translated::Ignored) => continue,
                Ok(Translated::Failed(failure)) => {
                    break Exit::Faulted(failure.into_error(&self.target));
                }
                Err(e) => break Exit::Faulted(e),
            };

            for message in messages {
                if let Err(exit) = self.publish(message).await {
                    break 'relay exit;
                }
                relayed += 1;
            }
        };

        match exit {
            Exit::Faulted(error) => {
                warn!(
                    "relay for '{}' faulted after {} messages: {}",
                    self.target, relayed, error
                );
                Some(error)
            }
            exit => {
                debug!(
                    "relay for '{}' finished after {} messages ({:?})",
                    self.target, relayed, exit
                );
                None
            }
        }
    }

    async fn next_frame(&mut self) -> Result<Option<WireFrame>, Exit> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }

        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(Exit::Cancelled),
            next = self.session.next_frame() => match next {
                None => Ok(None),
                Some(Ok(frame)) => Ok(Some(frame)),
                Some(Err(TransportError::Cancelled)) => Err(Exit::Cancelled),
                Some(Err(e)) if self.cancellation.is_cancelled() => {
                    debug!("session error after cancellation ignored: {}", e);
                    Err(Exit::Cancelled)
                }
                Some(Err(e)) => Err(Exit::Faulted(classify::transport_fault(e, &self.target))),
            },
        }
    }

    /// Publishes without waiting when there is room, otherwise waits up to
    /// the consumer timeout for the consumer to make some.
    async fn publish(&mut self, message: ReadMessage) -> Result<(), Exit> {
        // Counted before the send so the consumer never decrements first.
        self.queued.fetch_add(1, Ordering::AcqRel);

        let message = match self.sender.try_send(message) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Closed(_)) => {
                self.queued.fetch_sub(1, Ordering::AcqRel);
                return Err(Exit::Abandoned);
            }
            Err(TrySendError::Full(message)) => message,
        };

        debug!(
            "queue for '{}' full, waiting up to {:?} for the consumer",
            self.target, self.settings.consumer_timeout
        );

        let started = Instant::now();
        let send = tokio::time::timeout(self.settings.consumer_timeout, self.sender.send(message));
        let outcome = tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(Exit::Cancelled),
            sent = send => {
                match sent {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(_)) => Err(Exit::Abandoned),
                    Err(_) => Err(Exit::Faulted(Error::ConsumerTimeout {
                        elapsed: started.elapsed(),
                    })),
                }
            }
        };

        if outcome.is_err() {
            self.queued.fetch_sub(1, Ordering::AcqRel);
        }

        outcome
    }
}
