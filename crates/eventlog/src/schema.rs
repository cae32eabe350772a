use std::fmt;

use serde::{Deserialize, Serialize};

use crate::wire::legacy::{CONTENT_TYPE_BINARY, CONTENT_TYPE_JSON};

/// Serialization format of a record payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataFormat {
    /// JSON document.
    #[default]
    Json,
    /// Protocol buffers message.
    Protobuf,
    /// Avro record.
    Avro,
    /// Opaque bytes, never decoded.
    Bytes,
}

impl DataFormat {
    /// Maps a legacy content type to a format.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Self {
        match content_type {
            CONTENT_TYPE_JSON => Self::Json,
            "application/protobuf" | "application/x-protobuf" => Self::Protobuf,
            "application/avro" => Self::Avro,
            _ => Self::Bytes,
        }
    }

    /// The legacy content type for this format.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Json => CONTENT_TYPE_JSON,
            Self::Protobuf => "application/protobuf",
            Self::Avro => "application/avro",
            Self::Bytes => CONTENT_TYPE_BINARY,
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Protobuf => write!(f, "protobuf"),
            Self::Avro => write!(f, "avro"),
            Self::Bytes => write!(f, "bytes"),
        }
    }
}

/// Schema hint attached to a record: its type name and payload format.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaInfo {
    /// Schema (record type) name.
    pub name: String,
    /// Payload format.
    pub format: DataFormat,
}

impl SchemaInfo {
    /// Creates a schema hint.
    pub fn new(name: impl Into<String>, format: DataFormat) -> Self {
        Self {
            name: name.into(),
            format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_mapping() {
        assert_eq!(
            DataFormat::from_content_type("application/json"),
            DataFormat::Json
        );
        assert_eq!(
            DataFormat::from_content_type("application/octet-stream"),
            DataFormat::Bytes
        );
        assert_eq!(
            DataFormat::from_content_type("text/plain"),
            DataFormat::Bytes
        );
        assert_eq!(
            DataFormat::from_content_type(DataFormat::Protobuf.content_type()),
            DataFormat::Protobuf
        );
    }
}
