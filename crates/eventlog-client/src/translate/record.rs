use bytes::Bytes;
use proven_eventlog::wire::current;
use proven_eventlog::wire::legacy::{
    CONTENT_TYPE_KEY, CREATED_KEY, ReadEvent, RecordedEvent, TYPE_KEY,
};
use proven_eventlog::{DataFormat, Position, SchemaInfo, WireTimestamp};

use super::{Decoding, malformed, to_datetime};
use crate::error::Result;
use crate::record::{Decoded, Link, Payload, Record};

/// Decodes a payload unless decoding is skipped or the payload is opaque.
fn decode_payload(raw: &Bytes, schema: &SchemaInfo, decoding: &Decoding) -> Decoded {
    match decoding {
        Decoding::Skip => Decoded::Skipped,
        Decoding::Eager(_) if schema.format == DataFormat::Bytes => Decoded::Skipped,
        Decoding::Eager(decoder) => match decoder.decode(raw, schema) {
            Ok(value) => Decoded::Value(value),
            Err(error) => Decoded::Failed(error),
        },
    }
}

pub(super) fn from_legacy(event: ReadEvent, decoding: &Decoding) -> Result<Record> {
    // A link whose target was deleted arrives without an event; the link is
    // then the record.
    let (target, link) = match (event.event, event.link) {
        (Some(target), link) => (target, link),
        (None, Some(link)) => (link, None),
        (None, None) => return Err(malformed("read event carries no record")),
    };

    let schema = SchemaInfo::new(
        system_metadata(&target, TYPE_KEY)?,
        target
            .metadata
            .get(CONTENT_TYPE_KEY)
            .map_or(DataFormat::Bytes, |content_type| {
                DataFormat::from_content_type(content_type)
            }),
    );

    let ticks = system_metadata(&target, CREATED_KEY)?
        .parse::<i64>()
        .map_err(|e| malformed(format!("invalid '{CREATED_KEY}' on record {}: {e}", target.id)))?;
    let timestamp = to_datetime(WireTimestamp::from_ticks(ticks))
        .ok_or_else(|| malformed(format!("timestamp out of range on record {}", target.id)))?;

    let link = link.map(|link| Link {
        stream: link.stream_identifier.into(),
        revision: link.stream_revision,
        position: Position::new(link.commit_position, link.prepare_position),
    });
    let index_revision = link
        .as_ref()
        .map_or(target.stream_revision, |link| link.revision);

    let decoded = decode_payload(&target.data, &schema, decoding);

    Ok(Record {
        id: target.id,
        stream: target.stream_identifier.into(),
        revision: target.stream_revision,
        position: Position::new(target.commit_position, target.prepare_position),
        timestamp,
        schema,
        metadata: target.custom_metadata,
        payload: Payload::new(target.data, decoded),
        link,
        index_revision,
    })
}

fn system_metadata<'a>(event: &'a RecordedEvent, key: &str) -> Result<&'a str> {
    event
        .metadata
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| malformed(format!("record {} lacks '{key}' metadata", event.id)))
}

pub(super) fn from_current(wire: current::Record, decoding: &Decoding) -> Result<Record> {
    let timestamp = to_datetime(wire.timestamp)
        .ok_or_else(|| malformed(format!("timestamp out of range on record {}", wire.record_id)))?;

    let metadata = if wire.properties.is_empty() {
        Bytes::new()
    } else {
        serde_json::to_vec(&wire.properties)
            .map(Bytes::from)
            .map_err(|e| malformed(format!("properties of record {}: {e}", wire.record_id)))?
    };

    let link = wire.link.map(|link| Link {
        stream: link.stream.into(),
        revision: link.stream_revision,
        position: Position::from_offset(link.position),
    });
    let index_revision = link
        .as_ref()
        .map(|link| link.revision)
        .or(wire.index_revision)
        .unwrap_or(wire.stream_revision);

    let decoded = decode_payload(&wire.data, &wire.schema, decoding);

    Ok(Record {
        id: wire.record_id,
        stream: wire.stream.into(),
        revision: wire.stream_revision,
        position: Position::from_offset(wire.position),
        timestamp,
        schema: wire.schema,
        metadata,
        payload: Payload::new(wire.data, decoded),
        link,
        index_revision,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use proven_eventlog::JsonDecoder;
    use proven_eventlog::wire::current::LinkRef;
    use uuid::Uuid;

    use super::*;

    fn legacy_event(stream: &str, revision: u64, record_type: &str, data: &str) -> RecordedEvent {
        let mut metadata = HashMap::new();
        metadata.insert(TYPE_KEY.to_string(), record_type.to_string());
        metadata.insert(
            CONTENT_TYPE_KEY.to_string(),
            "application/json".to_string(),
        );
        metadata.insert(
            CREATED_KEY.to_string(),
            WireTimestamp::new(1_700_000_000, 0).to_ticks().to_string(),
        );

        RecordedEvent {
            id: Uuid::new_v4(),
            stream_identifier: stream.to_string(),
            stream_revision: revision,
            prepare_position: revision * 10,
            commit_position: revision * 10,
            metadata,
            custom_metadata: Bytes::new(),
            data: Bytes::from(data.to_string()),
        }
    }

    fn current_record(revision: u64, data: &str) -> current::Record {
        current::Record {
            record_id: Uuid::new_v4(),
            stream: "orders".to_string(),
            stream_revision: revision,
            position: 100 + revision,
            timestamp: WireTimestamp::new(1_700_000_000, 500),
            schema: SchemaInfo::new("OrderPlaced", DataFormat::Json),
            properties: HashMap::new(),
            data: Bytes::from(data.to_string()),
            link: None,
            index_revision: None,
        }
    }

    fn eager() -> Decoding {
        Decoding::Eager(Arc::new(JsonDecoder))
    }

    #[test]
    fn test_legacy_resolved_link() {
        let event = ReadEvent {
            event: Some(legacy_event("orders", 3, "OrderPlaced", r#"{"id":3}"#)),
            link: Some(legacy_event("$ce-orders", 11, "$>", "3@orders")),
            commit_position: Some(30),
        };

        let record = from_legacy(event, &eager()).unwrap();

        assert_eq!(record.revision, 3);
        assert_eq!(record.index_revision, 11);
        assert_eq!(
            record.link.as_ref().map(|l| l.stream.as_str()),
            Some("$ce-orders")
        );
        assert_eq!(record.record_type(), "OrderPlaced");
        assert_eq!(record.payload.value().unwrap()["id"], 3);
        assert_eq!(record.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_legacy_dangling_link() {
        let event = ReadEvent {
            event: None,
            link: Some(legacy_event("$ce-orders", 2, "$>", "0@orders")),
            commit_position: None,
        };

        let record = from_legacy(event, &Decoding::Skip).unwrap();

        assert_eq!(record.stream.as_str(), "$ce-orders");
        assert_eq!(record.index_revision, 2);
        assert!(record.link.is_none());
        assert_eq!(record.payload.decoded(), &Decoded::Skipped);
    }

    #[test]
    fn test_legacy_missing_type_is_malformed() {
        let mut target = legacy_event("orders", 0, "OrderPlaced", "{}");
        target.metadata.remove(TYPE_KEY);

        let event = ReadEvent {
            event: Some(target),
            link: None,
            commit_position: None,
        };

        assert!(matches!(
            from_legacy(event, &Decoding::Skip),
            Err(crate::Error::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_failure_stays_on_record() {
        let record = from_current(current_record(0, "{broken"), &eager()).unwrap();

        assert!(record.payload.value().is_none());
        assert!(record.payload.error().is_some());
    }

    #[test]
    fn test_bytes_format_is_never_decoded() {
        let mut wire = current_record(0, "\u{1}\u{2}");
        wire.schema = SchemaInfo::new("Blob", DataFormat::Bytes);

        let record = from_current(wire, &eager()).unwrap();

        assert_eq!(record.payload.decoded(), &Decoded::Skipped);
    }

    #[test]
    fn test_current_index_revision_priority() {
        let own = from_current(current_record(5, "{}"), &Decoding::Skip).unwrap();
        assert_eq!(own.index_revision, 5);

        let mut explicit = current_record(5, "{}");
        explicit.index_revision = Some(40);
        let explicit = from_current(explicit, &Decoding::Skip).unwrap();
        assert_eq!(explicit.index_revision, 40);

        let mut linked = current_record(5, "{}");
        linked.index_revision = Some(40);
        linked.link = Some(LinkRef {
            stream: "$et-OrderPlaced".to_string(),
            stream_revision: 7,
            position: 400,
        });
        let linked = from_current(linked, &Decoding::Skip).unwrap();
        assert_eq!(linked.index_revision, 7);
        assert_eq!(linked.position, Position::from_offset(105));
    }

    #[test]
    fn test_current_properties_become_metadata() {
        let mut wire = current_record(0, "{}");
        wire.properties
            .insert("tenant".to_string(), serde_json::json!("acme"));

        let record = from_current(wire, &Decoding::Skip).unwrap();
        let metadata: serde_json::Value = serde_json::from_slice(&record.metadata).unwrap();

        assert_eq!(metadata["tenant"], "acme");
    }
}
