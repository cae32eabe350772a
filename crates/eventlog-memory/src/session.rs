use async_trait::async_trait;
use proven_eventlog::{
    ReadRequest, SubscribeRequest, Transport, TransportError, WireFrame, WireSession,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::MemoryEventLog;
use crate::encode::Item;
use crate::read::read_frames;
use crate::subscribe::{run_subscription, send};

/// Frames buffered between a producer task and its session.
const SESSION_BUFFER: usize = 16;

/// Opens sessions against a [`MemoryEventLog`].
#[derive(Clone, Debug)]
pub struct MemoryTransport {
    log: MemoryEventLog,
}

impl MemoryTransport {
    pub(crate) const fn new(log: MemoryEventLog) -> Self {
        Self { log }
    }

    /// The log this transport reads from.
    #[must_use]
    pub const fn log(&self) -> &MemoryEventLog {
        &self.log
    }

    fn session(&self, cancellation: CancellationToken) -> (mpsc::Sender<Item>, MemorySession) {
        self.log.record_session_opened();

        let (sender, receiver) = mpsc::channel(SESSION_BUFFER);
        let session = MemorySession {
            receiver,
            cancellation,
            fail_after: self.log.config().fail_after_frames,
            delivered: 0,
            log: self.log.clone(),
        };

        (sender, session)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    type Session = MemorySession;

    async fn open_read(
        &self,
        request: ReadRequest,
        cancellation: CancellationToken,
    ) -> Result<MemorySession, TransportError> {
        let encoder = self.log.encoder();
        let frames = read_frames(&self.log.state().read(), &request, encoder);
        debug!("read session opened with {} frames", frames.len());

        let (sender, session) = self.session(cancellation.clone());
        tokio::spawn(async move {
            for frame in frames {
                if !send(&sender, &cancellation, frame).await {
                    break;
                }
            }
        });

        Ok(session)
    }

    async fn open_subscribe(
        &self,
        request: SubscribeRequest,
        cancellation: CancellationToken,
    ) -> Result<MemorySession, TransportError> {
        let (sender, session) = self.session(cancellation.clone());
        tokio::spawn(run_subscription(
            self.log.clone(),
            request,
            self.log.encoder(),
            sender,
            cancellation,
        ));

        Ok(session)
    }
}

/// One server-streaming session, fed by a producer task.
#[derive(Debug)]
pub struct MemorySession {
    receiver: mpsc::Receiver<Item>,
    cancellation: CancellationToken,
    fail_after: Option<usize>,
    delivered: usize,
    log: MemoryEventLog,
}

#[async_trait]
impl WireSession for MemorySession {
    async fn next_frame(&mut self) -> Option<Result<WireFrame, TransportError>> {
        if self.fail_after.is_some_and(|limit| self.delivered >= limit) {
            warn!("injected failure after {} frames", self.delivered);
            return Some(Err(TransportError::Unavailable(
                "connection reset by injected failure".to_string(),
            )));
        }

        let next = tokio::select! {
            biased;
            () = self.cancellation.cancelled() => return Some(Err(TransportError::Cancelled)),
            next = self.receiver.recv() => next,
        };

        if matches!(next, Some(Ok(_))) {
            self.delivered += 1;
            self.log.record_frame_delivered();
        }

        next
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}
