//! Error types for the protocol layer.

use parrot_schema::SchemaError;

/// Errors that can occur while decoding lite payloads.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The payload disagrees with its descriptor: a type mismatch, a
    /// missing required field, or a reference to an undeclared type.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The bytes are not valid JSON.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// Valid JSON, but not the shape the protocol expects at this point,
    /// e.g. an envelope that is neither an object nor a `{"p": ...}`
    /// wrapper.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A pushed payload carries a type discriminator we don't decode.
    #[error("unrecognized push discriminator `{0}`")]
    UnrecognizedDiscriminator(String),
}
