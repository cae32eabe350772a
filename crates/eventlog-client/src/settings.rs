//! Client configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Whether record payloads are decoded as they are relayed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeMode {
    /// Decode each payload as its record is translated.
    #[default]
    Eager,
    /// Leave payloads raw; see `Record::decode_with`.
    Skip,
}

/// Client configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Messages buffered between the relay and the consumer
    pub queue_capacity: usize,

    /// How long the relay waits for room in a full queue before faulting
    pub consumer_timeout: Duration,

    /// Whether reads and subscriptions resolve link records by default
    pub resolve_link_records: bool,

    /// Whether reads request heartbeats by default
    pub heartbeats: bool,

    /// Default payload decoding
    pub decode: DecodeMode,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 32,
            consumer_timeout: Duration::from_secs(10),
            resolve_link_records: false,
            heartbeats: false,
            decode: DecodeMode::Eager,
        }
    }
}

impl ClientSettings {
    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidSettings` for a zero capacity or timeout.
    pub fn validate(&self) -> Result<()> {
        self.relay().validate()
    }

    pub(crate) const fn relay(&self) -> RelaySettings {
        RelaySettings {
            queue_capacity: self.queue_capacity,
            consumer_timeout: self.consumer_timeout,
        }
    }
}

/// Effective settings of one message relay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelaySettings {
    /// Queue capacity.
    pub queue_capacity: usize,
    /// Timed publish bound.
    pub consumer_timeout: Duration,
}

impl RelaySettings {
    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidSettings` for a zero capacity or timeout.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::InvalidSettings(
                "queue capacity must be positive".to_string(),
            ));
        }

        if self.consumer_timeout.is_zero() {
            return Err(Error::InvalidSettings(
                "consumer timeout must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = ClientSettings::default();

        assert_eq!(settings.queue_capacity, 32);
        assert_eq!(settings.consumer_timeout, Duration::from_secs(10));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_values() {
        let settings = ClientSettings {
            queue_capacity: 0,
            ..ClientSettings::default()
        };
        assert_matches!(settings.validate(), Err(Error::InvalidSettings(_)));

        let relay = RelaySettings {
            queue_capacity: 4,
            consumer_timeout: Duration::ZERO,
        };
        assert_matches!(relay.validate(), Err(Error::InvalidSettings(_)));
    }

    #[test]
    fn test_partial_config() {
        let settings: ClientSettings =
            serde_json::from_str(r#"{"queue_capacity":8,"heartbeats":true}"#).unwrap();

        assert_eq!(settings.queue_capacity, 8);
        assert!(settings.heartbeats);
        assert_eq!(settings.decode, DecodeMode::Eager);
    }
}
