//! Stream metadata documents.
//!
//! A stream's metadata lives as JSON records in its metadata stream; the last
//! record wins. Soft deletion is expressed by setting the truncate-before
//! marker to [`TRUNCATE_BEFORE_DELETED`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Record type of metadata records.
pub const METADATA_RECORD_TYPE: &str = "$metadata";

/// Truncate-before value marking a soft-deleted stream.
#[allow(clippy::cast_sign_loss)]
pub const TRUNCATE_BEFORE_DELETED: u64 = i64::MAX as u64;

/// Access control list of a stream.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamAcl {
    /// Roles allowed to read.
    #[serde(rename = "$r", default, skip_serializing_if = "Vec::is_empty")]
    pub read: Vec<String>,
    /// Roles allowed to write.
    #[serde(rename = "$w", default, skip_serializing_if = "Vec::is_empty")]
    pub write: Vec<String>,
    /// Roles allowed to delete.
    #[serde(rename = "$d", default, skip_serializing_if = "Vec::is_empty")]
    pub delete: Vec<String>,
}

/// Metadata document of a stream.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamMetadata {
    /// Maximum number of records kept.
    #[serde(rename = "$maxCount", default, skip_serializing_if = "Option::is_none")]
    pub max_count: Option<u64>,
    /// Maximum record age in seconds.
    #[serde(rename = "$maxAge", default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u64>,
    /// Records before this revision are truncated.
    #[serde(rename = "$tb", default, skip_serializing_if = "Option::is_none")]
    pub truncate_before: Option<u64>,
    /// Cache control hint in seconds.
    #[serde(
        rename = "$cacheControl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cache_control: Option<u64>,
    /// Access control list.
    #[serde(rename = "$acl", default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<StreamAcl>,
    /// User properties.
    #[serde(flatten)]
    pub custom: HashMap<String, serde_json::Value>,
}

impl StreamMetadata {
    /// Metadata soft-deleting a stream.
    #[must_use]
    pub fn deleted() -> Self {
        Self {
            truncate_before: Some(TRUNCATE_BEFORE_DELETED),
            ..Self::default()
        }
    }

    /// Whether the truncate-before marker flags a soft delete.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.truncate_before == Some(TRUNCATE_BEFORE_DELETED)
    }

    /// Parses a metadata record payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a valid metadata document.
    pub fn from_slice(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Serializes the document.
    ///
    /// # Errors
    ///
    /// Returns an error if a custom property cannot be serialized.
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deleted_marker() {
        let payload = br#"{"$tb":9223372036854775807}"#;
        let metadata = StreamMetadata::from_slice(payload).unwrap();

        assert!(metadata.is_deleted());
        assert_eq!(metadata, StreamMetadata::deleted());
    }

    #[test]
    fn test_custom_properties() {
        let payload = br#"{"$maxCount":10,"$tb":3,"owner":"billing"}"#;
        let metadata = StreamMetadata::from_slice(payload).unwrap();

        assert_eq!(metadata.max_count, Some(10));
        assert_eq!(metadata.truncate_before, Some(3));
        assert!(!metadata.is_deleted());
        assert_eq!(metadata.custom["owner"], "billing");

        let reparsed = StreamMetadata::from_slice(&metadata.to_vec().unwrap()).unwrap();
        assert_eq!(reparsed, metadata);
    }
}
