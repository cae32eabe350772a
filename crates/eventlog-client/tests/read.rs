//! Reads against the in-memory log, in both protocol generations.

use std::time::Duration;

use assert_matches::assert_matches;
use futures::StreamExt;
use proven_eventlog::{
    DataFormat, ExpectedRevision, LogPosition, ProposedRecord, ProtocolVersion, RecordFilter,
    SchemaInfo, StreamName, StreamPosition,
};
use proven_eventlog_client::{
    Decoded, DecodeMode, Error, EventLogClient, MessageStream, ReadAllOptions, ReadMessage,
    ReadStreamOptions, RelayState,
};
use proven_eventlog_memory::{MemoryEventLog, MemoryTransport};
use tokio_util::sync::CancellationToken;

const PROTOCOLS: [ProtocolVersion; 2] = [ProtocolVersion::Legacy, ProtocolVersion::Current];

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn tick(i: u64) -> ProposedRecord {
    ProposedRecord::new(
        SchemaInfo::new("Tick", DataFormat::Json),
        format!(r#"{{"i":{i}}}"#),
    )
}

fn seeded(
    protocol: ProtocolVersion,
    count: u64,
) -> (MemoryEventLog, EventLogClient<MemoryTransport>) {
    let log = MemoryEventLog::new().with_protocol(protocol);
    log.append_now(
        "ticks",
        ExpectedRevision::NoStream,
        (0..count).map(tick).collect(),
    )
    .unwrap();

    let client = EventLogClient::new(log.transport());
    (log, client)
}

async fn collect(stream: &MessageStream) -> Vec<ReadMessage> {
    stream
        .messages()
        .unwrap()
        .map(Result::unwrap)
        .collect()
        .await
}

fn revisions(messages: &[ReadMessage]) -> Vec<u64> {
    messages
        .iter()
        .filter_map(ReadMessage::as_record)
        .map(|record| record.revision)
        .collect()
}

#[tokio::test]
async fn test_backwards_from_end_with_limit() {
    init_tracing();

    for protocol in PROTOCOLS {
        let (_log, client) = seeded(protocol, 5);

        let stream = client
            .read_stream(
                "ticks",
                ReadStreamOptions::backwards_from(StreamPosition::End).with_max_count(1),
            )
            .await
            .unwrap();

        assert_eq!(revisions(&collect(&stream).await), vec![4], "{protocol:?}");
    }
}

#[tokio::test]
async fn test_forwards_from_revision_then_caught_up() {
    init_tracing();

    for protocol in PROTOCOLS {
        let (_log, client) = seeded(protocol, 5);

        let stream = client
            .read_stream(
                "ticks",
                ReadStreamOptions::forwards_from(StreamPosition::Revision(2)).with_heartbeats(true),
            )
            .await
            .unwrap();
        let messages = collect(&stream).await;

        assert_eq!(revisions(&messages), vec![2, 3, 4], "{protocol:?}");
        assert_matches!(
            messages.last(),
            Some(ReadMessage::Heartbeat(heartbeat)) if heartbeat.is_caught_up()
        );
        assert_eq!(stream.state(), RelayState::Completed);
    }
}

#[tokio::test]
async fn test_records_carry_decoded_payloads() {
    init_tracing();

    for protocol in PROTOCOLS {
        let (_log, client) = seeded(protocol, 1);

        let stream = client
            .read_stream("ticks", ReadStreamOptions::default())
            .await
            .unwrap();
        let messages = collect(&stream).await;
        let record = messages[0].as_record().unwrap();

        assert_eq!(record.stream, StreamName::from("ticks"));
        assert_eq!(record.record_type(), "Tick");
        assert_eq!(record.payload.value(), Some(&serde_json::json!({ "i": 0 })));
        assert_eq!(record.index_revision, 0);
    }
}

#[tokio::test]
async fn test_skip_decoding() {
    init_tracing();
    let (_log, client) = seeded(ProtocolVersion::Current, 1);

    let stream = client
        .read_stream(
            "ticks",
            ReadStreamOptions::default().with_decode(DecodeMode::Skip),
        )
        .await
        .unwrap();
    let messages = collect(&stream).await;
    let record = messages[0].as_record().unwrap();

    assert_matches!(record.payload.decoded(), Decoded::Skipped);
    assert_eq!(record.payload.raw().as_ref(), br#"{"i":0}"#);
}

#[tokio::test]
async fn test_undecodable_payload_stays_on_record() {
    init_tracing();
    let log = MemoryEventLog::new();
    log.append_now(
        "ticks",
        ExpectedRevision::Any,
        vec![ProposedRecord::new(
            SchemaInfo::new("Tick", DataFormat::Json),
            "not json",
        )],
    )
    .unwrap();
    let client = EventLogClient::new(log.transport());

    let stream = client
        .read_stream("ticks", ReadStreamOptions::default())
        .await
        .unwrap();
    let messages = collect(&stream).await;

    let record = messages[0].as_record().unwrap();
    assert!(record.payload.error().is_some());
    assert_eq!(record.payload.raw().as_ref(), b"not json");
}

#[tokio::test]
async fn test_resolved_links() {
    init_tracing();

    for protocol in PROTOCOLS {
        let (log, client) = seeded(protocol, 2);
        let ticks = StreamName::from("ticks");
        log.append_now(
            "$ce-ticks",
            ExpectedRevision::Any,
            vec![
                MemoryEventLog::link_record(&ticks, 1),
                MemoryEventLog::link_record(&ticks, 7),
            ],
        )
        .unwrap();

        let stream = client
            .read_stream(
                "$ce-ticks",
                ReadStreamOptions::default().with_resolve_links(true),
            )
            .await
            .unwrap();
        let messages = collect(&stream).await;
        let records: Vec<_> = messages.iter().filter_map(ReadMessage::as_record).collect();

        assert_eq!(records.len(), 2, "{protocol:?}");

        assert_eq!(records[0].stream, ticks);
        assert_eq!(records[0].revision, 1);
        assert!(records[0].is_resolved());
        let link = records[0].link.as_ref().unwrap();
        assert_eq!(link.stream, StreamName::from("$ce-ticks"));
        assert_eq!(link.revision, 0);
        assert_eq!(records[0].index_revision, 0);

        // The dangling link is delivered as itself.
        assert_eq!(records[1].stream, StreamName::from("$ce-ticks"));
        assert_eq!(records[1].record_type(), "$>");
        assert!(!records[1].is_resolved());
    }
}

#[tokio::test]
async fn test_read_all_with_filter() {
    init_tracing();

    for protocol in PROTOCOLS {
        let (log, client) = seeded(protocol, 3);
        log.append_now("orders", ExpectedRevision::Any, vec![tick(0)])
            .unwrap();

        let stream = client
            .read_all(
                ReadAllOptions::forwards_from(LogPosition::Start)
                    .with_filter(RecordFilter::stream_prefixes(["ord"]).with_checkpoint_interval(2))
                    .with_heartbeats(true),
            )
            .await
            .unwrap();
        let messages = collect(&stream).await;

        let streams: Vec<_> = messages
            .iter()
            .filter_map(ReadMessage::as_record)
            .map(|record| record.stream.to_string())
            .collect();
        assert_eq!(streams, vec!["orders"], "{protocol:?}");

        let checkpoints = messages
            .iter()
            .filter_map(ReadMessage::as_heartbeat)
            .filter(|heartbeat| heartbeat.is_checkpoint())
            .count();
        assert_eq!(checkpoints, 2, "{protocol:?}");
    }
}

#[tokio::test]
async fn test_read_all_backwards() {
    init_tracing();
    let (log, client) = seeded(ProtocolVersion::Current, 3);
    log.append_now("orders", ExpectedRevision::Any, vec![tick(0)])
        .unwrap();

    let stream = client
        .read_all(ReadAllOptions::backwards_from(LogPosition::End).with_max_count(2))
        .await
        .unwrap();
    let messages = collect(&stream).await;

    let positions: Vec<_> = messages
        .iter()
        .filter_map(ReadMessage::as_record)
        .map(|record| record.position.commit)
        .collect();
    assert_eq!(positions, vec![3, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_slow_consumer_faults_after_timeout() {
    init_tracing();
    let (_log, client) = seeded(ProtocolVersion::Current, 10);

    let stream = client
        .read_stream(
            "ticks",
            ReadStreamOptions::default()
                .with_queue_capacity(1)
                .with_consumer_timeout(Duration::from_secs(5)),
        )
        .await
        .unwrap();
    let mut messages = stream.messages().unwrap();

    assert_matches!(messages.next().await, Some(Ok(_)));

    // Draining within the timeout keeps the relay alive.
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_matches!(messages.next().await, Some(Ok(_)));
    assert_eq!(stream.state(), RelayState::Running);

    tokio::time::sleep(Duration::from_secs(10)).await;

    let rest: Vec<_> = messages.collect().await;
    assert_matches!(
        rest.last(),
        Some(Err(Error::ConsumerTimeout { elapsed })) if *elapsed >= Duration::from_secs(5)
    );
    assert!(rest[..rest.len() - 1].iter().all(Result::is_ok));
    assert_eq!(stream.state(), RelayState::Faulted);
}

#[tokio::test]
async fn test_cancellation_ends_stream_cleanly() {
    init_tracing();
    let (_log, client) = seeded(ProtocolVersion::Current, 50);
    let token = CancellationToken::new();

    let mut stream = client
        .read_stream(
            "ticks",
            ReadStreamOptions::default()
                .with_queue_capacity(1)
                .with_cancellation(token.clone()),
        )
        .await
        .unwrap();

    let mut messages = stream.messages().unwrap();
    assert_matches!(messages.next().await, Some(Ok(_)));
    token.cancel();

    let rest: Vec<_> = messages.collect().await;
    assert!(rest.iter().all(Result::is_ok));
    assert!(rest.len() < 49);

    assert!(stream.dispose().await.is_ok());
}

#[tokio::test]
async fn test_cancelled_before_first_frame() {
    init_tracing();
    let (_log, client) = seeded(ProtocolVersion::Current, 3);
    let token = CancellationToken::new();
    token.cancel();

    let stream = client
        .read_stream(
            "ticks",
            ReadStreamOptions::default().with_cancellation(token),
        )
        .await
        .unwrap();

    assert!(collect(&stream).await.is_empty());
}

#[tokio::test]
async fn test_dispose_before_consumption() {
    init_tracing();
    let (log, client) = seeded(ProtocolVersion::Legacy, 5);

    let mut stream = client
        .read_stream("ticks", ReadStreamOptions::default())
        .await
        .unwrap();
    assert_eq!(stream.state(), RelayState::Cold);

    stream.dispose().await.unwrap();
    tokio::task::yield_now().await;

    assert_eq!(stream.state(), RelayState::Disposed);
    assert_eq!(log.frames_delivered(), 1);
    assert!(stream.dispose().await.is_ok());
}

#[tokio::test]
async fn test_second_iterator_is_rejected() {
    init_tracing();
    let (_log, client) = seeded(ProtocolVersion::Current, 2);

    let stream = client
        .read_stream("ticks", ReadStreamOptions::default())
        .await
        .unwrap();

    let first = stream.messages().unwrap();
    assert_matches!(stream.messages(), Err(Error::IteratorActive));
    drop(first);

    assert_eq!(revisions(&collect(&stream).await), vec![0, 1]);
}

#[tokio::test]
async fn test_mid_stream_transport_fault() {
    init_tracing();
    let (log, client) = seeded(ProtocolVersion::Legacy, 5);
    log.fail_after_frames(3);

    let mut stream = client
        .read_stream("ticks", ReadStreamOptions::default())
        .await
        .unwrap();
    let messages: Vec<_> = stream.messages().unwrap().collect().await;

    assert_eq!(messages.iter().filter(|message| message.is_ok()).count(), 3);
    assert_matches!(messages.last(), Some(Err(Error::Transport(_))));
    // Already surfaced through the iterator.
    assert!(stream.dispose().await.is_ok());
}

#[tokio::test]
async fn test_read_record() {
    init_tracing();
    let (_log, client) = seeded(ProtocolVersion::Current, 3);

    let record = client.read_record("ticks", 1).await.unwrap().unwrap();
    assert_eq!(record.revision, 1);
    assert_matches!(record.payload.decoded(), Decoded::Skipped);

    assert!(client.read_record("ticks", 9).await.unwrap().is_none());

    let last = client.read_last_record("ticks").await.unwrap().unwrap();
    assert_eq!(last.revision, 2);
}
