//! Transaction-layer error types.

/// Errors raised by the wire codecs behind a [`Schema`](crate::Schema).
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Failed to encode a value to MessagePack.
    #[error("failed to encode MessagePack: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Failed to decode a value from MessagePack.
    #[error("failed to decode MessagePack: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors returned by transaction registration, submission, and the external
/// encoding boundary.
#[derive(Debug, thiserror::Error)]
pub enum TxError {
    /// A transaction type name collided with one already registered, or the
    /// same type object was registered twice.
    #[error("transaction type {0:?} is already registered")]
    DuplicateRegistration(String),

    /// The transaction type has no ID yet.
    #[error("transaction type {0:?} has not been registered")]
    NotRegistered(String),

    /// External bytes were decoded before a schema was configured.
    #[error("cannot decode external bytes for {0:?} without setting a schema first")]
    SchemaNotConfigured(String),

    /// The external bytes did not match the configured schema.
    #[error("failed to decode {name:?}: {source}")]
    DecodeFailure {
        name: String,
        #[source]
        source: CodecError,
    },

    /// A value could not be encoded with the configured schema.
    #[error("failed to encode {name:?}: {source}")]
    EncodeFailure {
        name: String,
        #[source]
        source: CodecError,
    },
}
