//! Transaction Message Metadata
//!
//! Reads CIP-20 transaction messages (metadata label 674) out of CBOR encoded
//! auxiliary data.

use ciborium::value::Value;
use serde::Deserialize;
use thiserror::Error;

/// Metadata label reserved for transaction messages
pub const MESSAGE_LABEL: u64 = 674;

/// CBOR tag wrapping Alonzo-era auxiliary data
const ALONZO_AUX_TAG: u64 = 259;

/// Errors that can occur while reading message metadata
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("failed to decode CBOR: {0}")]
    Cbor(String),

    #[error("message metadata has an unexpected shape: {0}")]
    Shape(String),
}

/// Body stored under label 674
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Cip20Message {
    pub msg: Vec<String>,
}

/// Find the metadatum map inside any supported auxiliary data layout
fn metadata_map(value: &Value) -> Option<&Vec<(Value, Value)>> {
    match value {
        Value::Map(entries) => Some(entries),
        Value::Array(items) => items.first().and_then(metadata_map),
        Value::Tag(ALONZO_AUX_TAG, inner) => {
            let entries = inner.as_map()?;
            entries
                .iter()
                .find(|(key, _)| integer_key(key) == Some(0))
                .and_then(|(_, v)| v.as_map())
        }
        _ => None,
    }
}

fn integer_key(value: &Value) -> Option<u64> {
    value.as_integer().and_then(|i| u64::try_from(i).ok())
}

/// Decode the message under label 674, if there is one
///
/// # Arguments
/// * `cbor` - CBOR encoded auxiliary data
///
/// # Returns
/// `Ok(Some(Cip20Message))` when a well formed message is present, `Ok(None)` when the
/// label is absent
pub fn decode_message(cbor: &[u8]) -> Result<Option<Cip20Message>, MetadataError> {
    let value: Value =
        ciborium::de::from_reader(cbor).map_err(|e| MetadataError::Cbor(e.to_string()))?;

    let Some(entries) = metadata_map(&value) else {
        return Ok(None);
    };
    let Some((_, body)) = entries
        .iter()
        .find(|(key, _)| integer_key(key) == Some(MESSAGE_LABEL))
    else {
        return Ok(None);
    };

    body.deserialized::<Cip20Message>()
        .map(Some)
        .map_err(|e| MetadataError::Shape(e.to_string()))
}

/// First line of the transaction message, if the metadata carries one
pub fn first_message_line(cbor: &[u8]) -> Option<String> {
    decode_message(cbor)
        .ok()
        .flatten()
        .and_then(|message| message.msg.into_iter().next())
}

/// Encode a CIP-20 message as bare metadata, mostly for fixtures
pub fn encode_message(lines: &[&str]) -> Result<Vec<u8>, MetadataError> {
    let body = Value::Map(vec![(
        Value::Text("msg".to_string()),
        Value::Array(lines.iter().map(|l| Value::Text(l.to_string())).collect()),
    )]);
    let metadata = Value::Map(vec![(Value::Integer(MESSAGE_LABEL.into()), body)]);

    let mut out = Vec::new();
    ciborium::ser::into_writer(&metadata, &mut out).map_err(|e| MetadataError::Cbor(e.to_string()))?;
    Ok(out)
}
