use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

use proven_eventlog::{
    ALL_STREAM, Decoder, Direction, JsonDecoder, ReadRequest, ReadTarget, StreamName,
    StreamPosition, SubscribeRequest, SubscribeTarget, Transport, TransportError, WireFrame,
    WireSession,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::classify::{self, ServerFailure};
use crate::error::{Error, Result};
use crate::existence::{StreamExistenceResolver, StreamInfo, StreamState, VersionedMetadata};
use crate::message::ReadMessage;
use crate::message_stream::MessageStream;
use crate::options::{
    ReadAllOptions, ReadStreamOptions, StreamingOptions, SubscribeToAllOptions,
    SubscribeToStreamOptions,
};
use crate::record::Record;
use crate::relay::MessageRelay;
use crate::settings::{ClientSettings, DecodeMode, RelaySettings};
use crate::subscription::Subscription;
use crate::translate::{self, Decoding, Translated};

/// Outcome of the first frame of a session.
enum FirstFrame {
    Frame(WireFrame),
    Ended,
    Cancelled,
}

/// Outcome of a single-record read.
enum Single {
    Record(Record),
    Empty,
    Failed(ServerFailure),
}

/// Reads and subscribes to an event log through a transport.
///
/// Every read or subscribe call opens its session and inspects the first
/// frame before returning, so failures such as a missing stream or denied
/// access surface from the call itself rather than mid-stream.
#[derive(Clone)]
pub struct EventLogClient<T> {
    transport: T,
    settings: ClientSettings,
    decoder: Arc<dyn Decoder>,
}

impl<T> EventLogClient<T>
where
    T: Transport,
{
    /// Creates a client with default settings and JSON decoding.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            settings: ClientSettings::default(),
            decoder: Arc::new(JsonDecoder),
        }
    }

    /// Creates a client with the given settings.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidSettings` if the settings are invalid.
    pub fn with_settings(transport: T, settings: ClientSettings) -> Result<Self> {
        settings.validate()?;

        Ok(Self {
            transport,
            settings,
            decoder: Arc::new(JsonDecoder),
        })
    }

    /// Replaces the payload decoder.
    #[must_use]
    pub fn with_decoder(mut self, decoder: impl Decoder) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    /// The client settings.
    #[must_use]
    pub const fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Reads a stream.
    ///
    /// # Errors
    ///
    /// Returns a functional error if the stream cannot be read, or a
    /// transport error if the session cannot be opened.
    pub async fn read_stream(
        &self,
        stream: impl Into<StreamName>,
        options: ReadStreamOptions,
    ) -> Result<MessageStream> {
        let stream = stream.into();
        let request = ReadRequest {
            target: ReadTarget::Stream {
                stream: stream.clone(),
                from: options.from,
            },
            direction: options.direction,
            max_count: options.max_count,
            resolve_links: self.resolve_links(&options.streaming),
            heartbeats: options.heartbeats.unwrap_or(self.settings.heartbeats),
        };

        self.open_read(request, Some(stream), &options.streaming)
            .await
    }

    /// Reads the whole log.
    ///
    /// # Errors
    ///
    /// Returns `Error::AccessDenied` if the log cannot be read, or a
    /// transport error if the session cannot be opened.
    pub async fn read_all(&self, options: ReadAllOptions) -> Result<MessageStream> {
        let request = ReadRequest {
            target: ReadTarget::All {
                from: options.from,
                filter: options.filter,
            },
            direction: options.direction,
            max_count: options.max_count,
            resolve_links: self.resolve_links(&options.streaming),
            heartbeats: options.heartbeats.unwrap_or(self.settings.heartbeats),
        };

        self.open_read(request, None, &options.streaming).await
    }

    /// Subscribes to a stream.
    ///
    /// # Errors
    ///
    /// Returns a functional error if the stream cannot be followed, or a
    /// transport error if the subscription is not confirmed.
    pub async fn subscribe_to_stream(
        &self,
        stream: impl Into<StreamName>,
        options: SubscribeToStreamOptions,
    ) -> Result<Subscription> {
        let stream = stream.into();
        let request = SubscribeRequest {
            target: SubscribeTarget::Stream {
                stream: stream.clone(),
                from: options.from,
            },
            resolve_links: self.resolve_links(&options.streaming),
        };

        self.open_subscription(request, Some(stream), &options.streaming)
            .await
    }

    /// Subscribes to the whole log.
    ///
    /// # Errors
    ///
    /// Returns `Error::AccessDenied` if the log cannot be followed, or a
    /// transport error if the subscription is not confirmed.
    pub async fn subscribe_to_all(&self, options: SubscribeToAllOptions) -> Result<Subscription> {
        let request = SubscribeRequest {
            target: SubscribeTarget::All {
                from: options.from,
                filter: options.filter,
            },
            resolve_links: self.resolve_links(&options.streaming),
        };

        self.open_subscription(request, None, &options.streaming)
            .await
    }

    /// Checks the existence of a stream.
    ///
    /// # Errors
    ///
    /// Returns `Error::AccessDenied` if the stream cannot be read, or
    /// `Error::ContractViolation` if the server reports an absent stream
    /// whose metadata has no delete marker.
    pub async fn get_stream_info(&self, stream: impl Into<StreamName>) -> Result<StreamInfo> {
        let stream = stream.into();
        let resolver = StreamExistenceResolver::new(self);

        let state = match self.read_single(last_record_request(&stream)).await? {
            Single::Record(record) => StreamState::Active {
                last_revision: record.revision,
                last_position: record.position,
            },
            // Every record truncated away but the stream not deleted.
            Single::Empty => StreamState::Missing,
            Single::Failed(ServerFailure::NotFound) => {
                return resolver.resolve_not_found(&stream).await;
            }
            Single::Failed(ServerFailure::Ambiguous) => {
                return resolver.disambiguate_delete(&stream).await;
            }
            Single::Failed(ServerFailure::Tombstoned) => StreamState::Tombstoned,
            Single::Failed(ServerFailure::Deleted) => StreamState::Deleted,
            Single::Failed(ServerFailure::AccessDenied) => {
                return Err(Error::AccessDenied(stream));
            }
        };

        let metadata_revision = if stream.is_metadata_stream() {
            None
        } else {
            resolver
                .read_metadata(&stream)
                .await?
                .map(|versioned| versioned.revision)
        };

        Ok(StreamInfo {
            stream,
            state,
            metadata_revision,
        })
    }

    /// Reads the last record of a stream, without decoding its payload.
    ///
    /// # Errors
    ///
    /// Returns a functional error if the stream cannot be read.
    pub async fn read_last_record(&self, stream: impl Into<StreamName>) -> Result<Option<Record>> {
        let stream = stream.into();

        match self.read_single(last_record_request(&stream)).await? {
            Single::Record(record) => Ok(Some(record)),
            Single::Empty => Ok(None),
            Single::Failed(failure) => Err(self.failure_error(failure, Some(&stream)).await),
        }
    }

    /// Reads the record at `revision`, without decoding its payload.
    ///
    /// Returns `None` if the stream has no record at that revision.
    ///
    /// # Errors
    ///
    /// Returns a functional error if the stream cannot be read.
    pub async fn read_record(
        &self,
        stream: impl Into<StreamName>,
        revision: u64,
    ) -> Result<Option<Record>> {
        let stream = stream.into();
        let request = ReadRequest {
            target: ReadTarget::Stream {
                stream: stream.clone(),
                from: StreamPosition::Revision(revision),
            },
            direction: Direction::Forwards,
            max_count: Some(1),
            resolve_links: false,
            heartbeats: false,
        };

        match self.read_single(request).await? {
            Single::Record(record) if record.revision == revision => Ok(Some(record)),
            Single::Record(_) | Single::Empty => Ok(None),
            Single::Failed(failure) => Err(self.failure_error(failure, Some(&stream)).await),
        }
    }

    /// Reads the current metadata of a stream.
    ///
    /// # Errors
    ///
    /// Returns `Error::AccessDenied` if the metadata cannot be read, or
    /// `Error::ContractViolation` if it is not a metadata document.
    pub async fn get_stream_metadata(
        &self,
        stream: impl Into<StreamName>,
    ) -> Result<Option<VersionedMetadata>> {
        let stream = stream.into();
        if stream.is_metadata_stream() {
            return Ok(None);
        }

        StreamExistenceResolver::new(self)
            .read_metadata(&stream)
            .await
    }

    /// Last record of `stream` with decoding skipped, `None` when the stream
    /// is absent. Never resolves a missing stream further.
    pub(crate) async fn fetch_last_raw(&self, stream: &StreamName) -> Result<Option<Record>> {
        match self.read_single(last_record_request(stream)).await? {
            Single::Record(record) => Ok(Some(record)),
            Single::Empty | Single::Failed(ServerFailure::NotFound) => Ok(None),
            Single::Failed(failure) => Err(failure.into_error(stream)),
        }
    }

    async fn open_read(
        &self,
        request: ReadRequest,
        stream: Option<StreamName>,
        streaming: &StreamingOptions,
    ) -> Result<MessageStream> {
        let relay = self.relay_settings(streaming)?;
        let cancellation = session_token(streaming);
        let target = stream.clone().unwrap_or_else(log_target);

        debug!("opening read of '{}'", target);
        let mut session = match self.transport.open_read(request, cancellation.clone()).await {
            Ok(session) => session,
            Err(e) => return Err(self.open_error(e, stream.as_ref()).await),
        };

        let pending = match self
            .first_frame(&mut session, &cancellation, stream.as_ref())
            .await?
        {
            FirstFrame::Frame(frame) => Some(frame),
            FirstFrame::Ended => None,
            FirstFrame::Cancelled => return Ok(MessageStream::empty()),
        };

        Ok(message_stream(session, pending, target, relay, self.decoding(streaming)))
    }

    async fn open_subscription(
        &self,
        request: SubscribeRequest,
        stream: Option<StreamName>,
        streaming: &StreamingOptions,
    ) -> Result<Subscription> {
        let relay = self.relay_settings(streaming)?;
        let cancellation = session_token(streaming);
        let target = stream.clone().unwrap_or_else(log_target);

        debug!("opening subscription to '{}'", target);
        let mut session = match self
            .transport
            .open_subscribe(request, cancellation.clone())
            .await
        {
            Ok(session) => session,
            Err(e) => return Err(self.open_error(e, stream.as_ref()).await),
        };

        let id = match self
            .first_frame(&mut session, &cancellation, stream.as_ref())
            .await?
        {
            FirstFrame::Frame(frame) => match translate::translate(frame, &Decoding::Skip)? {
                Translated::Confirmed(id) => id,
                _ => {
                    return Err(Error::MalformedFrame(format!(
                        "subscription to '{target}' started without a confirmation"
                    )));
                }
            },
            FirstFrame::Ended => {
                return Err(Error::Transport(TransportError::Unavailable(format!(
                    "subscription to '{target}' closed before it was confirmed"
                ))));
            }
            FirstFrame::Cancelled => {
                return Ok(Subscription::new(String::new(), MessageStream::empty()));
            }
        };

        info!("subscription {} to '{}' confirmed", id, target);
        let stream = message_stream(session, None, target, relay, self.decoding(streaming));

        Ok(Subscription::new(id, stream))
    }

    /// Pulls the first frame, turning a failure it reports into an error.
    async fn first_frame<S>(
        &self,
        session: &mut S,
        cancellation: &CancellationToken,
        stream: Option<&StreamName>,
    ) -> Result<FirstFrame>
    where
        S: WireSession,
    {
        let first = tokio::select! {
            biased;
            () = cancellation.cancelled() => return Ok(FirstFrame::Cancelled),
            first = session.next_frame() => first,
        };

        match first {
            None => Ok(FirstFrame::Ended),
            Some(Ok(frame)) => match classify::frame_failure(&frame) {
                Some(failure) => Err(self.failure_error(failure, stream).await),
                None => Ok(FirstFrame::Frame(frame)),
            },
            Some(Err(TransportError::Cancelled)) => Ok(FirstFrame::Cancelled),
            Some(Err(_)) if cancellation.is_cancelled() => Ok(FirstFrame::Cancelled),
            Some(Err(e)) => Err(self.open_error(e, stream).await),
        }
    }

    async fn read_single(&self, request: ReadRequest) -> Result<Single> {
        let cancellation = CancellationToken::new();
        let _session_guard = cancellation.clone().drop_guard();

        let mut session = match self.transport.open_read(request, cancellation).await {
            Ok(session) => session,
            Err(e) => return single_failure(e),
        };

        while let Some(frame) = session.next_frame().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => return single_failure(e),
            };

            match translate::translate(frame, &Decoding::Skip)? {
                Translated::Messages(messages) => {
                    if let Some(record) = messages.into_iter().find_map(ReadMessage::into_record) {
                        return Ok(Single::Record(record));
                    }
                }
                Translated::Failed(failure) => return Ok(Single::Failed(failure)),
                Translated::Confirmed(_) | Translated::Ignored => {}
            }
        }

        Ok(Single::Empty)
    }

    async fn open_error(&self, error: TransportError, stream: Option<&StreamName>) -> Error {
        match classify::status_failure(&error) {
            Some(failure) => self.failure_error(failure, stream).await,
            None => Error::Transport(error),
        }
    }

    /// The error for a failure reported before any message was relayed,
    /// probing the metadata stream where the wire is ambiguous.
    async fn failure_error(&self, failure: ServerFailure, stream: Option<&StreamName>) -> Error {
        let Some(stream) = stream else {
            return failure.into_error(&log_target());
        };

        let resolved = match failure {
            ServerFailure::NotFound => {
                StreamExistenceResolver::new(self)
                    .resolve_not_found(stream)
                    .await
            }
            ServerFailure::Ambiguous => {
                StreamExistenceResolver::new(self)
                    .disambiguate_delete(stream)
                    .await
            }
            _ => return failure.into_error(stream),
        };

        match resolved {
            Ok(StreamInfo {
                state: StreamState::Deleted,
                ..
            }) => Error::StreamDeleted(stream.clone()),
            Ok(StreamInfo {
                state: StreamState::Tombstoned,
                ..
            }) => Error::StreamTombstoned(stream.clone()),
            Ok(_) => Error::StreamNotFound(stream.clone()),
            Err(e) => e,
        }
    }

    fn resolve_links(&self, streaming: &StreamingOptions) -> bool {
        streaming
            .resolve_links
            .unwrap_or(self.settings.resolve_link_records)
    }

    fn relay_settings(&self, streaming: &StreamingOptions) -> Result<RelaySettings> {
        let defaults = self.settings.relay();
        let settings = RelaySettings {
            queue_capacity: streaming.queue_capacity.unwrap_or(defaults.queue_capacity),
            consumer_timeout: streaming
                .consumer_timeout
                .unwrap_or(defaults.consumer_timeout),
        };
        settings.validate()?;

        Ok(settings)
    }

    fn decoding(&self, streaming: &StreamingOptions) -> Decoding {
        match streaming.decode.unwrap_or(self.settings.decode) {
            DecodeMode::Eager => Decoding::Eager(self.decoder.clone()),
            DecodeMode::Skip => Decoding::Skip,
        }
    }
}

fn message_stream<S>(
    session: S,
    pending: Option<WireFrame>,
    target: StreamName,
    settings: RelaySettings,
    decoding: Decoding,
) -> MessageStream
where
    S: WireSession,
{
    let cancellation = session.cancellation().clone();
    let (sender, receiver) = mpsc::channel(settings.queue_capacity);
    let queued = Arc::new(AtomicUsize::new(0));

    let relay = MessageRelay::new(
        session,
        pending,
        target,
        sender,
        settings,
        decoding,
        queued.clone(),
    );

    MessageStream::new(Box::pin(relay.run()), receiver, queued, cancellation)
}

fn log_target() -> StreamName {
    StreamName::from(ALL_STREAM)
}

fn session_token(streaming: &StreamingOptions) -> CancellationToken {
    streaming
        .cancellation
        .as_ref()
        .map_or_else(CancellationToken::new, CancellationToken::child_token)
}

fn last_record_request(stream: &StreamName) -> ReadRequest {
    ReadRequest {
        target: ReadTarget::Stream {
            stream: stream.clone(),
            from: StreamPosition::End,
        },
        direction: Direction::Backwards,
        max_count: Some(1),
        resolve_links: false,
        heartbeats: false,
    }
}

fn single_failure(error: TransportError) -> Result<Single> {
    match classify::status_failure(&error) {
        Some(failure) => Ok(Single::Failed(failure)),
        None => Err(Error::Transport(error)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use proven_eventlog::wire::current::{HeartbeatKind, ReadResponse};
    use proven_eventlog::wire::legacy::ReadResp;

    use super::*;
    use crate::options::SubscribeToStreamOptions;

    /// Answers every subscription with the same scripted frames.
    #[derive(Clone)]
    struct ScriptedTransport {
        frames: Vec<WireFrame>,
    }

    struct ScriptedSession {
        frames: VecDeque<WireFrame>,
        cancellation: CancellationToken,
    }

    #[async_trait]
    impl WireSession for ScriptedSession {
        async fn next_frame(&mut self) -> Option<std::result::Result<WireFrame, TransportError>> {
            self.frames.pop_front().map(Ok)
        }

        fn cancellation(&self) -> &CancellationToken {
            &self.cancellation
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        type Session = ScriptedSession;

        async fn open_read(
            &self,
            _request: ReadRequest,
            cancellation: CancellationToken,
        ) -> std::result::Result<ScriptedSession, TransportError> {
            Ok(self.session(cancellation))
        }

        async fn open_subscribe(
            &self,
            _request: SubscribeRequest,
            cancellation: CancellationToken,
        ) -> std::result::Result<ScriptedSession, TransportError> {
            Ok(self.session(cancellation))
        }
    }

    impl ScriptedTransport {
        fn session(&self, cancellation: CancellationToken) -> ScriptedSession {
            ScriptedSession {
                frames: self.frames.clone().into(),
                cancellation,
            }
        }
    }

    fn client(frames: Vec<WireFrame>) -> EventLogClient<ScriptedTransport> {
        EventLogClient::new(ScriptedTransport { frames })
    }

    #[tokio::test]
    async fn test_subscription_id_comes_from_confirmation() {
        let legacy = client(vec![
            ReadResp::Confirmation {
                subscription_id: "sub-legacy".into(),
            }
            .into(),
        ]);
        let current = client(vec![
            ReadResponse::SubscriptionConfirmed {
                subscription_id: "sub-current".into(),
            }
            .into(),
        ]);

        let subscription = legacy
            .subscribe_to_stream("orders", SubscribeToStreamOptions::default())
            .await
            .unwrap();
        assert_eq!(subscription.id(), "sub-legacy");

        let subscription = current
            .subscribe_to_stream("orders", SubscribeToStreamOptions::default())
            .await
            .unwrap();
        assert_eq!(subscription.id(), "sub-current");
    }

    #[tokio::test]
    async fn test_subscription_without_confirmation_is_malformed() {
        let unconfirmed = client(vec![
            ReadResponse::Heartbeat {
                kind: HeartbeatKind::CaughtUp,
                position: None,
                stream_revision: Some(0),
                timestamp: None,
            }
            .into(),
        ]);

        let result = unconfirmed
            .subscribe_to_stream("orders", SubscribeToStreamOptions::default())
            .await;

        assert_matches!(result, Err(Error::MalformedFrame(_)));
    }
}
