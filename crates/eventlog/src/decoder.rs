use thiserror::Error;

use crate::schema::{DataFormat, SchemaInfo};

/// Errors raised while decoding a record payload.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload is not valid for its declared format.
    #[error("invalid {format} payload for schema '{schema}': {message}")]
    Invalid {
        /// Schema name.
        schema: String,
        /// Declared format.
        format: DataFormat,
        /// Decoder message.
        message: String,
    },

    /// The decoder does not handle this format.
    #[error("no decoder for {0} payloads")]
    Unsupported(DataFormat),
}

/// Decodes record payloads into structured values.
pub trait Decoder: Send + Sync + 'static {
    /// Decodes `payload` according to `schema`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be decoded.
    fn decode(
        &self,
        payload: &[u8],
        schema: &SchemaInfo,
    ) -> Result<serde_json::Value, DecodeError>;
}

/// Decodes JSON payloads. Other formats are unsupported.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode(
        &self,
        payload: &[u8],
        schema: &SchemaInfo,
    ) -> Result<serde_json::Value, DecodeError> {
        if schema.format != DataFormat::Json {
            return Err(DecodeError::Unsupported(schema.format));
        }

        serde_json::from_slice(payload).map_err(|e| DecodeError::Invalid {
            schema: schema.name.clone(),
            format: schema.format,
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_json_decoder() {
        let schema = SchemaInfo::new("OrderPlaced", DataFormat::Json);

        let value = JsonDecoder.decode(br#"{"id":7}"#, &schema).unwrap();
        assert_eq!(value["id"], 7);

        assert_matches!(
            JsonDecoder.decode(b"{not json", &schema),
            Err(DecodeError::Invalid { schema, .. }) if schema == "OrderPlaced"
        );
    }

    #[test]
    fn test_json_decoder_rejects_other_formats() {
        let schema = SchemaInfo::new("Blob", DataFormat::Avro);

        assert_matches!(
            JsonDecoder.decode(b"{}", &schema),
            Err(DecodeError::Unsupported(DataFormat::Avro))
        );
    }
}
