//! Convenience decoders for cached payloads.
//!
//! The engine itself is payload-agnostic and moves raw bytes around. These
//! helpers cover the common JSON and MessagePack cases.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{CoreError, Result};

/// Decodes a JSON payload into an object map.
///
/// Fails with [`CoreError::NotAnObject`] when the payload is valid JSON but
/// not an object.
pub fn decode_map(bytes: &[u8]) -> Result<Map<String, Value>> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(map) => Ok(map),
        _ => Err(CoreError::NotAnObject),
    }
}

/// Decodes a JSON payload into any deserializable type.
pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Decodes a MessagePack payload into any deserializable type.
pub fn decode_msgpack<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(rmp_serde::from_slice(bytes)?)
}
