use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix marking a stream as the metadata stream of another stream.
pub const METADATA_STREAM_PREFIX: &str = "$$";

/// Prefix shared by every system stream.
pub const SYSTEM_STREAM_PREFIX: &str = "$";

/// Name standing for the log as a whole, across every stream.
pub const ALL_STREAM: &str = "$all";

/// Name of an append-only stream.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamName(String);

impl StreamName {
    /// Creates a stream name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the metadata stream associated with this stream.
    #[must_use]
    pub fn metadata_stream(&self) -> Self {
        Self(format!("{METADATA_STREAM_PREFIX}{}", self.0))
    }

    /// Whether this stream is itself a metadata stream.
    #[must_use]
    pub fn is_metadata_stream(&self) -> bool {
        self.0.starts_with(METADATA_STREAM_PREFIX)
    }

    /// For a metadata stream, the stream it describes.
    #[must_use]
    pub fn original_stream(&self) -> Option<Self> {
        self.0
            .strip_prefix(METADATA_STREAM_PREFIX)
            .map(|name| Self(name.to_string()))
    }

    /// Whether this is a system stream (metadata streams included).
    #[must_use]
    pub fn is_system_stream(&self) -> bool {
        self.0.starts_with(SYSTEM_STREAM_PREFIX)
    }
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for StreamName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&StreamName> for StreamName {
    fn from(name: &StreamName) -> Self {
        name.clone()
    }
}

impl AsRef<str> for StreamName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for StreamName {
    fn borrow(&self) -> &str {
        &self.0
    }
}
