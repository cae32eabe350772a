//! Consumer handle over a message relay.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll, ready};

use futures::Stream;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};
use crate::message::ReadMessage;

/// Lifecycle state of a message stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayState {
    /// Not consumed yet; no relay task exists.
    Cold,
    /// The relay task is running.
    Running,
    /// The relay ended without a fault.
    Completed,
    /// The relay ended with a fault.
    Faulted,
    /// The stream was disposed.
    Disposed,
}

enum Lifecycle {
    Cold(BoxFuture<'static, Option<Error>>),
    Running(JoinHandle<Option<Error>>),
    Completed,
    /// Holds the fault until it has been surfaced once.
    Faulted(Option<Error>),
    Disposed,
}

impl Lifecycle {
    const fn state(&self) -> RelayState {
        match self {
            Self::Cold(_) => RelayState::Cold,
            Self::Running(_) => RelayState::Running,
            Self::Completed => RelayState::Completed,
            Self::Faulted(_) => RelayState::Faulted,
            Self::Disposed => RelayState::Disposed,
        }
    }
}

struct Consumer {
    active: bool,
    receiver: Option<mpsc::Receiver<ReadMessage>>,
}

/// A single-consumer, lazily started sequence of read messages.
///
/// The relay behind the stream starts on first consumption. Only one
/// iterator may be active at a time. Faults raised by the relay surface
/// exactly once, either from the iterator or from [`MessageStream::dispose`];
/// cancellation just ends the sequence.
pub struct MessageStream {
    lifecycle: Mutex<Lifecycle>,
    consumer: Mutex<Consumer>,
    queued: Arc<AtomicUsize>,
    cancellation: CancellationToken,
}

impl MessageStream {
    pub(crate) fn new(
        relay: BoxFuture<'static, Option<Error>>,
        receiver: mpsc::Receiver<ReadMessage>,
        queued: Arc<AtomicUsize>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            lifecycle: Mutex::new(Lifecycle::Cold(relay)),
            consumer: Mutex::new(Consumer {
                active: false,
                receiver: Some(receiver),
            }),
            queued,
            cancellation,
        }
    }

    /// A stream that yields nothing.
    pub(crate) fn empty() -> Self {
        let (sender, receiver) = mpsc::channel(1);
        drop(sender);

        Self {
            lifecycle: Mutex::new(Lifecycle::Completed),
            consumer: Mutex::new(Consumer {
                active: false,
                receiver: Some(receiver),
            }),
            queued: Arc::new(AtomicUsize::new(0)),
            cancellation: CancellationToken::new(),
        }
    }

    /// Returns the iterator over the stream's messages.
    ///
    /// Polling the iterator for the first time starts the relay.
    ///
    /// # Errors
    ///
    /// Returns `Error::IteratorActive` if another iterator is alive.
    pub fn messages(&self) -> Result<Messages<'_>> {
        let mut consumer = self.consumer.lock();
        if consumer.active {
            return Err(Error::IteratorActive);
        }
        consumer.active = true;

        Ok(Messages {
            stream: self,
            receiver: consumer.receiver.take(),
            finished: false,
        })
    }

    /// Best-effort count of buffered messages not yet delivered.
    #[must_use]
    pub fn queued_messages(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// The lifecycle state.
    #[must_use]
    pub fn state(&self) -> RelayState {
        self.lifecycle.lock().state()
    }

    /// Releases the stream, discarding buffered messages.
    ///
    /// A never-started stream is released without starting its relay. A
    /// running relay is cancelled and awaited. Calling this again, or after
    /// the fault was surfaced, does nothing.
    ///
    /// # Errors
    ///
    /// Returns the relay's fault if it faulted and the fault was not
    /// surfaced yet.
    pub async fn dispose(&mut self) -> Result<()> {
        let lifecycle = std::mem::replace(self.lifecycle.get_mut(), Lifecycle::Disposed);
        self.consumer.get_mut().receiver = None;
        self.queued.store(0, Ordering::Release);

        match lifecycle {
            Lifecycle::Cold(relay) => {
                drop(relay);
                self.cancellation.cancel();
                debug!("message stream disposed before its relay started");
                Ok(())
            }
            Lifecycle::Running(handle) => {
                self.cancellation.cancel();
                match handle.await {
                    Ok(None) => Ok(()),
                    Ok(Some(fault)) => Err(fault),
                    Err(e) => Err(e.into()),
                }
            }
            Lifecycle::Faulted(Some(fault)) => Err(fault),
            Lifecycle::Completed | Lifecycle::Faulted(None) | Lifecycle::Disposed => Ok(()),
        }
    }

    fn start(&self) {
        let mut lifecycle = self.lifecycle.lock();
        *lifecycle = match std::mem::replace(&mut *lifecycle, Lifecycle::Disposed) {
            Lifecycle::Cold(relay) => {
                debug!("starting message relay");
                Lifecycle::Running(tokio::spawn(relay))
            }
            other => other,
        };
    }

    /// Resolves once the relay has ended, yielding its fault the first time
    /// it is observed.
    fn poll_outcome(&self, cx: &mut Context<'_>) -> Poll<Option<Error>> {
        let mut lifecycle = self.lifecycle.lock();
        match &mut *lifecycle {
            Lifecycle::Running(handle) => {
                let fault = match ready!(Pin::new(handle).poll(cx)) {
                    Ok(fault) => fault,
                    Err(e) => Some(e.into()),
                };
                *lifecycle = if fault.is_some() {
                    Lifecycle::Faulted(None)
                } else {
                    Lifecycle::Completed
                };
                Poll::Ready(fault)
            }
            Lifecycle::Faulted(fault) => Poll::Ready(fault.take()),
            Lifecycle::Cold(_) | Lifecycle::Completed | Lifecycle::Disposed => Poll::Ready(None),
        }
    }
}

impl std::fmt::Debug for MessageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStream")
            .field("state", &self.state())
            .field("queued", &self.queued_messages())
            .finish_non_exhaustive()
    }
}

impl Drop for MessageStream {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

/// Iterator over a [`MessageStream`], obtained from [`MessageStream::messages`].
///
/// Dropping the iterator hands undelivered messages back to the stream so a
/// later iterator continues where this one stopped.
pub struct Messages<'a> {
    stream: &'a MessageStream,
    receiver: Option<mpsc::Receiver<ReadMessage>>,
    finished: bool,
}

impl std::fmt::Debug for Messages<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messages")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl Stream for Messages<'_> {
    type Item = Result<ReadMessage>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        this.stream.start();

        if let Some(receiver) = this.receiver.as_mut() {
            match receiver.poll_recv(cx) {
                Poll::Ready(Some(message)) => {
                    this.stream.queued.fetch_sub(1, Ordering::AcqRel);
                    return Poll::Ready(Some(Ok(message)));
                }
                Poll::Ready(None) => {}
                Poll::Pending => return Poll::Pending,
            }
        }

        let fault = ready!(this.stream.poll_outcome(cx));
        this.finished = true;
        Poll::Ready(fault.map(Err))
    }
}

impl Drop for Messages<'_> {
    fn drop(&mut self) {
        let mut consumer = self.stream.consumer.lock();
        consumer.active = false;
        consumer.receiver = self.receiver.take();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use futures::StreamExt;

    use super::*;
    use crate::heartbeat::{Heartbeat, HeartbeatKind};

    fn heartbeat(revision: u64) -> ReadMessage {
        ReadMessage::Heartbeat(Heartbeat {
            kind: HeartbeatKind::CaughtUp,
            position: None,
            revision: Some(revision),
            timestamp: None,
        })
    }

    /// A stream whose relay publishes `count` heartbeats and then ends with
    /// `fault`.
    fn scripted(count: u64, fault: Option<Error>) -> MessageStream {
        let (sender, receiver) = mpsc::channel(8);
        let queued = Arc::new(AtomicUsize::new(0));
        let relay_queued = queued.clone();

        let relay = Box::pin(async move {
            for revision in 0..count {
                relay_queued.fetch_add(1, Ordering::AcqRel);
                if sender.send(heartbeat(revision)).await.is_err() {
                    return None;
                }
            }
            fault
        });

        MessageStream::new(relay, receiver, queued, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_relay_starts_on_first_poll() {
        let stream = scripted(2, None);
        assert_eq!(stream.state(), RelayState::Cold);
        assert_eq!(stream.queued_messages(), 0);

        let messages: Vec<_> = stream.messages().unwrap().collect().await;

        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(Result::is_ok));
        assert_eq!(stream.state(), RelayState::Completed);
    }

    #[tokio::test]
    async fn test_debug_reports_state() {
        let stream = scripted(1, None);
        assert!(format!("{stream:?}").contains("Cold"));

        let messages = stream.messages().unwrap();
        assert!(format!("{messages:?}").starts_with("Messages"));
    }

    #[tokio::test]
    async fn test_second_iterator_is_rejected() {
        let stream = scripted(1, None);

        let first = stream.messages().unwrap();
        assert_matches!(stream.messages(), Err(Error::IteratorActive));

        drop(first);
        assert!(stream.messages().is_ok());
    }

    #[tokio::test]
    async fn test_fault_surfaces_once() {
        let mut stream = scripted(
            1,
            Some(Error::ConsumerTimeout {
                elapsed: Duration::from_secs(3),
            }),
        );

        let mut messages = stream.messages().unwrap();
        assert_matches!(messages.next().await, Some(Ok(_)));
        assert_matches!(messages.next().await, Some(Err(Error::ConsumerTimeout { .. })));
        assert_matches!(messages.next().await, None);
        drop(messages);

        assert_eq!(stream.state(), RelayState::Faulted);
        assert!(stream.dispose().await.is_ok());
    }

    #[tokio::test]
    async fn test_dispose_surfaces_unobserved_fault() {
        let mut stream = scripted(0, Some(Error::Internal("boom".into())));

        let mut messages = stream.messages().unwrap();
        // Starts the relay; the fault is not observed through the iterator.
        let _ = futures::poll!(messages.next());
        drop(messages);
        tokio::task::yield_now().await;

        assert_matches!(stream.dispose().await, Err(Error::Internal(_)));
        assert!(stream.dispose().await.is_ok());
        assert_eq!(stream.state(), RelayState::Disposed);
    }

    #[tokio::test]
    async fn test_dispose_cold_stream() {
        let mut stream = scripted(3, None);

        assert!(stream.dispose().await.is_ok());
        assert_eq!(stream.state(), RelayState::Disposed);

        let messages: Vec<_> = stream.messages().unwrap().collect().await;
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let stream = MessageStream::empty();

        assert_matches!(stream.messages().unwrap().next().await, None);
    }

    #[tokio::test]
    async fn test_queued_messages_tracks_buffer() {
        let stream = scripted(3, None);

        let mut messages = stream.messages().unwrap();
        assert_matches!(messages.next().await, Some(Ok(_)));
        tokio::task::yield_now().await;

        assert_eq!(stream.queued_messages(), 2);
    }
}
