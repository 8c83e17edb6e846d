//! External encoding descriptors.
//!
//! A [`Schema`] tells a transaction type (or a read handler) how values are
//! laid out on the wire when they arrive from, or are returned to, something
//! outside the engine.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::CodecError;

/// Wire encoding used at the engine boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Schema {
    /// MessagePack with structs encoded as arrays (field order matters).
    MessagePack,
    /// MessagePack with structs encoded as maps keyed by field name.
    MessagePackNamed,
    /// UTF-8 JSON.
    Json,
}

impl Schema {
    /// Encode `value` with this schema.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the value cannot be represented.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        match self {
            Schema::MessagePack => codec::encode(value),
            Schema::MessagePackNamed => codec::encode_named(value),
            Schema::Json => Ok(serde_json::to_vec(value)?),
        }
    }

    /// Decode a value from `bytes` with this schema.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] on malformed input.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        match self {
            Schema::MessagePack | Schema::MessagePackNamed => codec::decode(bytes),
            Schema::Json => Ok(serde_json::from_slice(bytes)?),
        }
    }
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Schema::MessagePack => "msgpack",
            Schema::MessagePackNamed => "msgpack-named",
            Schema::Json => "json",
        };
        f.write_str(name)
    }
}
