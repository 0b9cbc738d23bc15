//! Error types for the schema layer.

/// Errors raised while compiling schema text or reflecting on messages.
///
/// Parse errors are collected per block by the compiler; the other
/// variants come out of [`Message`](crate::Message) reflection and out of
/// the codec when a payload disagrees with its descriptor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// A `message` or `enum` block could not be parsed.
    /// `block` is the block's name, or the raw header when the name itself
    /// could not be read.
    #[error("malformed block `{block}`: {reason}")]
    Parse { block: String, reason: String },

    /// A value's shape disagrees with the field's declared type or label.
    #[error("type mismatch for {message}.{field}: expected {expected}, found {found}")]
    TypeMismatch {
        message: String,
        field: String,
        expected: String,
        found: String,
    },

    /// A required field was absent during construction or decoding.
    #[error("required field {message}.{field} is missing")]
    RequiredFieldMissing { message: String, field: String },

    /// Reflection asked for a field id or name the message doesn't declare.
    #[error("message {message} has no field `{field}`")]
    FieldNotFound { message: String, field: String },

    /// A `message(name)` reference names neither a message nor an enum.
    #[error("unresolved type `{0}`")]
    UnresolvedType(String),
}
