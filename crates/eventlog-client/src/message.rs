use crate::heartbeat::Heartbeat;
use crate::record::Record;

/// A message delivered by a message stream, in wire order.
#[derive(Clone, Debug, PartialEq)]
#[allow(clippy::large_enum_variant)]
pub enum ReadMessage {
    /// A record.
    Record(Record),
    /// A heartbeat.
    Heartbeat(Heartbeat),
}

impl ReadMessage {
    /// The record, if this is one.
    #[must_use]
    pub const fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            Self::Heartbeat(_) => None,
        }
    }

    /// The heartbeat, if this is one.
    #[must_use]
    pub const fn as_heartbeat(&self) -> Option<&Heartbeat> {
        match self {
            Self::Record(_) => None,
            Self::Heartbeat(heartbeat) => Some(heartbeat),
        }
    }

    /// Converts into the record, if this is one.
    #[must_use]
    pub fn into_record(self) -> Option<Record> {
        match self {
            Self::Record(record) => Some(record),
            Self::Heartbeat(_) => None,
        }
    }
}

impl From<Record> for ReadMessage {
    fn from(record: Record) -> Self {
        Self::Record(record)
    }
}

impl From<Heartbeat> for ReadMessage {
    fn from(heartbeat: Heartbeat) -> Self {
        Self::Heartbeat(heartbeat)
    }
}
