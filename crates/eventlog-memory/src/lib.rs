//! In-memory event log for tests and local development.
//!
//! [`MemoryEventLog`] holds the records and answers appends. Its
//! [`MemoryTransport`] serves reads and subscriptions in either protocol
//! generation, and can be told to deny access, tombstone streams or drop a
//! session mid-flight so client failure handling can be exercised.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod encode;
mod filter;
mod read;
mod session;
mod state;
mod subscribe;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use proven_eventlog::{
    AppendError, AppendSuccess, Appender, DataFormat, ExpectedRevision, ProposedRecord,
    ProtocolVersion, SchemaInfo, StreamMetadata, StreamName,
};
use tokio::sync::broadcast;
use tracing::debug;

pub use encode::CURRENT_BATCH_SIZE;
pub use session::{MemorySession, MemoryTransport};
pub use state::LINK_RECORD_TYPE;

use encode::WireEncoder;
use state::{LogState, metadata_record};
use subscribe::LiveSender;

/// Records a lagging subscription may trail the log by before it falls behind.
pub const DEFAULT_LIVE_BUFFER: usize = 1024;

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct MemoryConfig {
    pub protocol: ProtocolVersion,
    pub conflate_tombstone_errors: bool,
    pub fail_after_frames: Option<usize>,
}

#[derive(Debug)]
struct Inner {
    state: RwLock<LogState>,
    live: LiveSender,
    config: Mutex<MemoryConfig>,
    sessions_opened: AtomicUsize,
    frames_delivered: AtomicUsize,
}

/// A shared in-memory event log.
#[derive(Clone, Debug)]
pub struct MemoryEventLog {
    inner: Arc<Inner>,
}

impl Default for MemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEventLog {
    /// Creates an empty log speaking the current protocol.
    #[must_use]
    pub fn new() -> Self {
        Self::with_live_buffer(DEFAULT_LIVE_BUFFER)
    }

    /// Creates an empty log whose subscriptions fall behind once they trail
    /// it by more than `capacity` records.
    #[must_use]
    pub fn with_live_buffer(capacity: usize) -> Self {
        let (live, _) = broadcast::channel(capacity.max(1));

        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(LogState::default()),
                live,
                config: Mutex::new(MemoryConfig::default()),
                sessions_opened: AtomicUsize::new(0),
                frames_delivered: AtomicUsize::new(0),
            }),
        }
    }

    /// Sets the protocol generation of sessions opened from now on.
    #[must_use]
    pub fn with_protocol(self, protocol: ProtocolVersion) -> Self {
        self.inner.config.lock().protocol = protocol;
        self
    }

    /// Makes the legacy protocol report tombstoned streams with the
    /// wrong-expected-version exception, as older servers do.
    #[must_use]
    pub fn with_conflated_tombstone_errors(self) -> Self {
        self.inner.config.lock().conflate_tombstone_errors = true;
        self
    }

    /// Fails every session opened from now on with an unavailable error
    /// once it has delivered `frames` frames.
    pub fn fail_after_frames(&self, frames: usize) {
        self.inner.config.lock().fail_after_frames = Some(frames);
    }

    /// A transport serving this log.
    #[must_use]
    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport::new(self.clone())
    }

    /// Appends synchronously.
    ///
    /// # Errors
    ///
    /// See [`Appender::append`].
    pub fn append_now(
        &self,
        stream: impl Into<StreamName>,
        expected: ExpectedRevision,
        records: Vec<ProposedRecord>,
    ) -> Result<AppendSuccess, AppendError> {
        let stream = stream.into();
        let mut state = self.inner.state.write();

        let (success, appended) = state.append(&stream, expected, records)?;
        for record in appended {
            // No live subscribers is not an error.
            let _ = self.inner.live.send(record);
        }
        drop(state);

        debug!(
            "appended to '{}', now at revision {}",
            stream, success.next_expected_revision
        );
        Ok(success)
    }

    /// Writes a metadata document for `stream`.
    ///
    /// # Errors
    ///
    /// See [`Appender::append`].
    pub fn set_metadata(
        &self,
        stream: impl Into<StreamName>,
        metadata: &StreamMetadata,
    ) -> Result<AppendSuccess, AppendError> {
        let stream = stream.into();
        self.append_now(
            stream.metadata_stream(),
            ExpectedRevision::Any,
            vec![metadata_record(metadata)?],
        )
    }

    /// Soft deletes `stream` by writing the delete marker to its metadata.
    ///
    /// # Errors
    ///
    /// See [`Appender::append`].
    pub fn soft_delete(&self, stream: impl Into<StreamName>) -> Result<AppendSuccess, AppendError> {
        self.set_metadata(stream, &StreamMetadata::deleted())
    }

    /// Permanently deletes `stream`.
    pub fn tombstone(&self, stream: impl Into<StreamName>) {
        self.inner.state.write().tombstone(&stream.into());
    }

    /// Denies reads of and appends to `stream`. Use [`proven_eventlog::ALL_STREAM`] to deny
    /// log-wide reads.
    pub fn deny_access(&self, stream: impl Into<StreamName>) {
        self.inner.state.write().set_denied(&stream.into(), true);
    }

    /// Lifts a denial made by [`Self::deny_access`].
    pub fn allow_access(&self, stream: impl Into<StreamName>) {
        self.inner.state.write().set_denied(&stream.into(), false);
    }

    /// A record linking to `revision` of `stream`.
    #[must_use]
    pub fn link_record(stream: &StreamName, revision: u64) -> ProposedRecord {
        ProposedRecord::new(
            SchemaInfo::new(LINK_RECORD_TYPE, DataFormat::Bytes),
            format!("{revision}@{stream}"),
        )
    }

    /// Sessions opened so far.
    #[must_use]
    pub fn sessions_opened(&self) -> usize {
        self.inner.sessions_opened.load(Ordering::SeqCst)
    }

    /// Frames handed to clients so far, across all sessions.
    #[must_use]
    pub fn frames_delivered(&self) -> usize {
        self.inner.frames_delivered.load(Ordering::SeqCst)
    }

    pub(crate) fn state(&self) -> &RwLock<LogState> {
        &self.inner.state
    }

    pub(crate) fn live(&self) -> &LiveSender {
        &self.inner.live
    }

    pub(crate) fn config(&self) -> MemoryConfig {
        *self.inner.config.lock()
    }

    pub(crate) fn encoder(&self) -> WireEncoder {
        let config = self.config();
        WireEncoder::new(config.protocol, config.conflate_tombstone_errors)
    }

    pub(crate) fn record_session_opened(&self) {
        self.inner.sessions_opened.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_frame_delivered(&self) {
        self.inner.frames_delivered.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Appender for MemoryEventLog {
    async fn append(
        &self,
        stream: StreamName,
        expected: ExpectedRevision,
        records: Vec<ProposedRecord>,
    ) -> Result<AppendSuccess, AppendError> {
        self.append_now(stream, expected, records)
    }
}
