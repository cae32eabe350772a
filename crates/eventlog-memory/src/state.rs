use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use proven_eventlog::{
    AppendError, AppendSuccess, DataFormat, ExpectedRevision, METADATA_RECORD_TYPE, Position,
    ProposedRecord, SchemaInfo, StreamMetadata, StreamName, TRUNCATE_BEFORE_DELETED,
    WireTimestamp,
};
use uuid::Uuid;

/// Record type of link records.
pub const LINK_RECORD_TYPE: &str = "$>";

/// A record as held by the log.
#[derive(Debug)]
pub(crate) struct StoredRecord {
    pub id: Uuid,
    pub stream: StreamName,
    pub revision: u64,
    pub position: u64,
    pub schema: SchemaInfo,
    pub properties: HashMap<String, serde_json::Value>,
    pub data: Bytes,
    pub created: WireTimestamp,
}

impl StoredRecord {
    /// The `(revision, stream)` a link record points at.
    fn link_target(&self) -> Option<(u64, StreamName)> {
        if self.schema.name != LINK_RECORD_TYPE {
            return None;
        }

        let text = std::str::from_utf8(&self.data).ok()?;
        let (revision, stream) = text.split_once('@')?;

        Some((revision.parse().ok()?, StreamName::from(stream)))
    }
}

/// A record ready to be encoded, with the link it was reached through.
#[derive(Debug)]
pub(crate) enum Resolved {
    Record(Arc<StoredRecord>),
    Link {
        link: Arc<StoredRecord>,
        target: Option<Arc<StoredRecord>>,
    },
}

/// What a reader may see of a stream.
pub(crate) enum StreamAccess {
    Denied,
    Tombstoned,
    /// Never written, or soft deleted.
    Missing,
    /// Records past the truncate-before marker, oldest first.
    Visible(Vec<Arc<StoredRecord>>),
}

#[derive(Debug, Default)]
struct StreamEntry {
    records: Vec<usize>,
    tombstoned: bool,
}

#[derive(Debug, Default)]
pub(crate) struct LogState {
    pub log: Vec<Arc<StoredRecord>>,
    streams: HashMap<StreamName, StreamEntry>,
    denied: HashSet<StreamName>,
}

impl LogState {
    pub(crate) fn append(
        &mut self,
        stream: &StreamName,
        expected: ExpectedRevision,
        records: Vec<ProposedRecord>,
    ) -> Result<(AppendSuccess, Vec<Arc<StoredRecord>>), AppendError> {
        if self.denied.contains(stream) {
            return Err(AppendError::AccessDenied(stream.clone()));
        }
        if self.is_tombstoned(stream) {
            return Err(AppendError::StreamTombstoned(stream.clone()));
        }

        let actual = self.last_revision(stream);
        let matches = match expected {
            ExpectedRevision::Any => true,
            ExpectedRevision::NoStream => actual.is_none(),
            ExpectedRevision::StreamExists => actual.is_some(),
            ExpectedRevision::Exact(revision) => actual == Some(revision),
        };
        if !matches {
            return Err(AppendError::WrongExpectedRevision {
                stream: stream.clone(),
                expected,
                actual,
            });
        }

        let mut next_revision = actual.map_or(0, |revision| revision + 1);
        let mut appended = Vec::with_capacity(records.len() + 1);

        // Writing to a soft-deleted stream recreates it from the next revision.
        if !stream.is_metadata_stream()
            && self.truncate_before(stream) == Some(TRUNCATE_BEFORE_DELETED)
        {
            let metadata = StreamMetadata {
                truncate_before: Some(next_revision),
                ..StreamMetadata::default()
            };
            appended.push(self.push_metadata(stream, &metadata)?);
        }

        for record in records {
            appended.push(self.push(stream, next_revision, record));
            next_revision += 1;
        }

        let success = match self.log_records(stream).last() {
            Some(last) => AppendSuccess {
                next_expected_revision: last.revision,
                position: Position::from_offset(last.position),
            },
            None => AppendSuccess {
                next_expected_revision: 0,
                position: Position::START,
            },
        };

        Ok((success, appended))
    }

    fn push_metadata(
        &mut self,
        stream: &StreamName,
        metadata: &StreamMetadata,
    ) -> Result<Arc<StoredRecord>, AppendError> {
        let metadata_stream = stream.metadata_stream();
        let revision = self
            .last_revision(&metadata_stream)
            .map_or(0, |revision| revision + 1);

        Ok(self.push(&metadata_stream, revision, metadata_record(metadata)?))
    }

    fn push(
        &mut self,
        stream: &StreamName,
        revision: u64,
        record: ProposedRecord,
    ) -> Arc<StoredRecord> {
        let index = self.log.len();
        let stored = Arc::new(StoredRecord {
            id: record.id,
            stream: stream.clone(),
            revision,
            position: index as u64,
            schema: record.schema,
            properties: record.properties,
            data: record.data,
            created: WireTimestamp::now(),
        });

        self.log.push(stored.clone());
        self.streams
            .entry(stream.clone())
            .or_default()
            .records
            .push(index);

        stored
    }

    pub(crate) fn tombstone(&mut self, stream: &StreamName) {
        self.streams.entry(stream.clone()).or_default().tombstoned = true;
    }

    pub(crate) fn set_denied(&mut self, stream: &StreamName, denied: bool) {
        if denied {
            self.denied.insert(stream.clone());
        } else {
            self.denied.remove(stream);
        }
    }

    pub(crate) fn is_denied(&self, stream: &StreamName) -> bool {
        self.denied.contains(stream)
    }

    pub(crate) fn is_tombstoned(&self, stream: &StreamName) -> bool {
        self.streams
            .get(stream)
            .is_some_and(|entry| entry.tombstoned)
    }

    fn log_records(
        &self,
        stream: &StreamName,
    ) -> impl DoubleEndedIterator<Item = &Arc<StoredRecord>> {
        self.streams
            .get(stream)
            .into_iter()
            .flat_map(|entry| entry.records.iter().map(|&index| &self.log[index]))
    }

    pub(crate) fn last_revision(&self, stream: &StreamName) -> Option<u64> {
        self.log_records(stream)
            .next_back()
            .map(|record| record.revision)
    }

    /// The truncate-before marker of the stream's latest metadata document.
    pub(crate) fn truncate_before(&self, stream: &StreamName) -> Option<u64> {
        let last = self.log_records(&stream.metadata_stream()).next_back()?;

        StreamMetadata::from_slice(&last.data)
            .ok()
            .and_then(|metadata| metadata.truncate_before)
    }

    pub(crate) fn access(&self, stream: &StreamName) -> StreamAccess {
        if self.is_denied(stream) {
            return StreamAccess::Denied;
        }
        if self.is_tombstoned(stream) {
            return StreamAccess::Tombstoned;
        }

        let truncate_before = if stream.is_metadata_stream() {
            None
        } else {
            self.truncate_before(stream)
        };
        if truncate_before == Some(TRUNCATE_BEFORE_DELETED) || !self.streams.contains_key(stream) {
            return StreamAccess::Missing;
        }

        StreamAccess::Visible(
            self.log_records(stream)
                .filter(|record| truncate_before.is_none_or(|before| record.revision >= before))
                .cloned()
                .collect(),
        )
    }

    /// Follows a link record to its target when `resolve_links` is set.
    pub(crate) fn resolve(&self, record: &Arc<StoredRecord>, resolve_links: bool) -> Resolved {
        if !resolve_links {
            return Resolved::Record(record.clone());
        }

        match record.link_target() {
            Some((revision, stream)) => Resolved::Link {
                link: record.clone(),
                target: self
                    .log_records(&stream)
                    .find(|target| target.revision == revision)
                    .cloned(),
            },
            None => Resolved::Record(record.clone()),
        }
    }
}

/// A metadata record holding `metadata`.
pub(crate) fn metadata_record(metadata: &StreamMetadata) -> Result<ProposedRecord, AppendError> {
    let payload = match metadata.to_vec() {
        Ok(payload) => payload,
        Err(e) => return Err(proven_eventlog::TransportError::Other(e.to_string()).into()),
    };

    Ok(ProposedRecord::new(
        SchemaInfo::new(METADATA_RECORD_TYPE, DataFormat::Json),
        payload,
    ))
}
