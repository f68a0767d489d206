//! Codec for library event records
//!
//! Values are UTF-8 JSON; keys are 32-bit big-endian integers, the layout the
//! Kafka integer serializer writes.

use thiserror::Error;

use crate::models::LibraryEvent;

/// Errors raised while encoding or decoding records
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("payload is not a valid library event: {0}")]
    Json(#[from] serde_json::Error),

    #[error("integer key must be 4 bytes, got {0}")]
    KeyLength(usize),
}

/// Decode a record value into a library event
pub fn decode_event(payload: &[u8]) -> Result<LibraryEvent, CodecError> {
    let json = std::str::from_utf8(payload)?;
    Ok(serde_json::from_str(json)?)
}

/// Encode a library event as a record value
pub fn encode_event(event: &LibraryEvent) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(event)?)
}

/// Encode an integer record key
pub fn encode_key(key: i32) -> [u8; 4] {
    key.to_be_bytes()
}

/// Decode an integer record key
pub fn decode_key(bytes: &[u8]) -> Result<i32, CodecError> {
    let raw: [u8; 4] = bytes.try_into().map_err(|_| CodecError::KeyLength(bytes.len()))?;
    Ok(i32::from_be_bytes(raw))
}
