//! Stream existence: what a stream's state is, and how the client tells a
//! missing stream from a deleted one when the server only says "not found".

use proven_eventlog::{Position, StreamMetadata, StreamName, Transport};
use tracing::{debug, warn};

use crate::client::EventLogClient;
use crate::error::{Error, Result};

/// Existence state of a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    /// The stream has records.
    Active {
        /// Revision of the last record.
        last_revision: u64,
        /// Log position of the last record.
        last_position: Position,
    },
    /// Soft deleted through the truncate-before marker of its metadata.
    Deleted,
    /// Permanently deleted.
    Tombstoned,
    /// Never existed.
    Missing,
}

/// Existence of a stream at the time it was checked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamInfo {
    /// The stream.
    pub stream: StreamName,
    /// Its state.
    pub state: StreamState,
    /// Revision of its last metadata record, if any.
    pub metadata_revision: Option<u64>,
}

/// A metadata document and the revision it was read at.
#[derive(Clone, Debug, PartialEq)]
pub struct VersionedMetadata {
    /// Revision of the metadata record.
    pub revision: u64,
    /// The document.
    pub metadata: StreamMetadata,
}

/// Reads a stream's metadata stream to classify an absent stream.
pub(crate) struct StreamExistenceResolver<'a, T> {
    client: &'a EventLogClient<T>,
}

impl<'a, T> StreamExistenceResolver<'a, T>
where
    T: Transport,
{
    pub(crate) const fn new(client: &'a EventLogClient<T>) -> Self {
        Self { client }
    }

    /// Classifies a stream the server reported as not found: `Missing` when
    /// it has no metadata, `Deleted` when its metadata carries the delete
    /// marker.
    ///
    /// Metadata streams resolve to `Missing` without any read.
    ///
    /// # Errors
    ///
    /// `Error::ContractViolation` when metadata exists without the marker,
    /// `Error::AccessDenied` for `stream` when its metadata may not be read.
    pub(crate) async fn resolve_not_found(&self, stream: &StreamName) -> Result<StreamInfo> {
        if stream.is_metadata_stream() {
            debug!("'{}' is a metadata stream, not resolving further", stream);
            return Ok(info(stream, StreamState::Missing, None));
        }

        let Some(versioned) = self.read_metadata(stream).await? else {
            debug!("'{}' has no metadata, it never existed", stream);
            return Ok(info(stream, StreamState::Missing, None));
        };

        if versioned.metadata.is_deleted() {
            debug!("'{}' carries the delete marker", stream);
            return Ok(info(stream, StreamState::Deleted, Some(versioned.revision)));
        }

        warn!(
            "'{}' is absent but its metadata at revision {} has no delete marker",
            stream, versioned.revision
        );
        Err(Error::ContractViolation(format!(
            "stream '{stream}' is absent but its metadata at revision {} has no delete marker",
            versioned.revision
        )))
    }

    /// Classifies a stream the legacy server reported with a wrong expected
    /// version, which it also uses for deletes: `Deleted` when its metadata
    /// carries the delete marker, `Tombstoned` otherwise.
    ///
    /// # Errors
    ///
    /// `Error::AccessDenied` for `stream` when its metadata may not be read.
    pub(crate) async fn disambiguate_delete(&self, stream: &StreamName) -> Result<StreamInfo> {
        if stream.is_metadata_stream() {
            return Ok(info(stream, StreamState::Tombstoned, None));
        }

        Ok(match self.read_metadata(stream).await? {
            Some(versioned) if versioned.metadata.is_deleted() => {
                info(stream, StreamState::Deleted, Some(versioned.revision))
            }
            Some(versioned) => info(stream, StreamState::Tombstoned, Some(versioned.revision)),
            None => info(stream, StreamState::Tombstoned, None),
        })
    }

    /// The last metadata record of `stream`.
    ///
    /// # Errors
    ///
    /// `Error::AccessDenied` for `stream` when its metadata may not be read,
    /// `Error::ContractViolation` when the record is not a metadata document.
    pub(crate) async fn read_metadata(
        &self,
        stream: &StreamName,
    ) -> Result<Option<VersionedMetadata>> {
        let metadata_stream = stream.metadata_stream();

        let record = match self.client.fetch_last_raw(&metadata_stream).await {
            Ok(record) => record,
            Err(Error::AccessDenied(_)) => return Err(Error::AccessDenied(stream.clone())),
            Err(e) => return Err(e),
        };

        record
            .map(|record| {
                StreamMetadata::from_slice(record.payload.raw())
                    .map(|metadata| VersionedMetadata {
                        revision: record.revision,
                        metadata,
                    })
                    .map_err(|e| {
                        Error::ContractViolation(format!(
                            "metadata of '{stream}' at revision {} is not a metadata document: {e}",
                            record.revision
                        ))
                    })
            })
            .transpose()
    }
}

fn info(stream: &StreamName, state: StreamState, metadata_revision: Option<u64>) -> StreamInfo {
    StreamInfo {
        stream: stream.clone(),
        state,
        metadata_revision,
    }
}
