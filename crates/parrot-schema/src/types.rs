//! Descriptor types: the compiled form of `message` and `enum` blocks.
//!
//! Descriptors are built once by the compiler and never mutated. Messages
//! hold them behind an `Arc`, so every instance of a message type shares
//! one table.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// FieldLabel
// ---------------------------------------------------------------------------

/// The cardinality of a field.
///
/// - `Required` → must be present when a message is built or decoded.
/// - `Optional` → may be absent (`FieldValue::Unset`).
/// - `Repeated` → an ordered sequence, empty by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldLabel {
    Required,
    Optional,
    Repeated,
}

impl FieldLabel {
    /// Parses a label keyword. Returns `None` for anything else.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "required" => Some(Self::Required),
            "optional" => Some(Self::Optional),
            "repeated" => Some(Self::Repeated),
            _ => None,
        }
    }

    /// The keyword as written in schema text.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Optional => "optional",
            Self::Repeated => "repeated",
        }
    }
}

impl fmt::Display for FieldLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FieldType
// ---------------------------------------------------------------------------

/// The declared type of a field.
///
/// Any type token that isn't one of the scalar keywords becomes
/// `Message(name)`. The name may point at a message or at an enum; the
/// [`Schema`](crate::Schema) resolves it when the field is used, so
/// forward references are fine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Bytes,
    Bool,
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Message(String),
}

impl FieldType {
    /// Maps a type token to a field type. Never fails: unknown tokens are
    /// type references.
    pub fn parse(token: &str) -> Self {
        match token {
            "string" => Self::String,
            "bytes" => Self::Bytes,
            "bool" => Self::Bool,
            "double" => Self::Double,
            "float" => Self::Float,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint32" => Self::Uint32,
            "uint64" => Self::Uint64,
            "sint32" => Self::Sint32,
            "sint64" => Self::Sint64,
            "fixed32" => Self::Fixed32,
            "fixed64" => Self::Fixed64,
            "sfixed32" => Self::Sfixed32,
            "sfixed64" => Self::Sfixed64,
            other => Self::Message(other.to_string()),
        }
    }

    /// `true` for `Message(_)`.
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Message(_))
    }

    /// Signed integer kinds that fit in 32 bits.
    pub fn is_signed_32(&self) -> bool {
        matches!(self, Self::Int32 | Self::Sint32 | Self::Sfixed32)
    }

    /// Signed integer kinds that need 64 bits.
    pub fn is_signed_64(&self) -> bool {
        matches!(self, Self::Int64 | Self::Sint64 | Self::Sfixed64)
    }

    /// Unsigned integer kinds that fit in 32 bits.
    pub fn is_unsigned_32(&self) -> bool {
        matches!(self, Self::Uint32 | Self::Fixed32)
    }

    /// Unsigned integer kinds that need 64 bits.
    pub fn is_unsigned_64(&self) -> bool {
        matches!(self, Self::Uint64 | Self::Fixed64)
    }

    /// The token as written in schema text.
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Bool => "bool",
            Self::Double => "double",
            Self::Float => "float",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Sint32 => "sint32",
            Self::Sint64 => "sint64",
            Self::Fixed32 => "fixed32",
            Self::Fixed64 => "fixed64",
            Self::Sfixed32 => "sfixed32",
            Self::Sfixed64 => "sfixed64",
            Self::Message(name) => name,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FieldDescriptor
// ---------------------------------------------------------------------------

/// One field of a message: `label type name = id;`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Positive field number, unique within the message.
    pub id: u32,
    /// The snake_case name from the schema.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Cardinality.
    pub label: FieldLabel,
}

impl FieldDescriptor {
    /// The camelCase accessor name (`state_update_header` → `stateUpdateHeader`).
    pub fn camel_name(&self) -> String {
        crate::camel_case(&self.name)
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} = {};",
            self.label, self.field_type, self.name, self.id
        )
    }
}

// ---------------------------------------------------------------------------
// MessageDescriptor
// ---------------------------------------------------------------------------

/// A compiled `message` block. Fields are kept sorted by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl MessageDescriptor {
    /// Builds a descriptor, sorting fields by id.
    ///
    /// The compiler rejects duplicate ids before calling this; callers
    /// building descriptors by hand are trusted to do the same.
    pub fn new(name: impl Into<String>, mut fields: Vec<FieldDescriptor>) -> Self {
        fields.sort_by_key(|f| f.id);
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Looks up a field by id.
    pub fn field(&self, id: u32) -> Option<&FieldDescriptor> {
        self.fields
            .binary_search_by_key(&id, |f| f.id)
            .ok()
            .map(|idx| &self.fields[idx])
    }

    /// Position of a field in [`fields`](Self::fields), by id.
    pub fn index_of(&self, id: u32) -> Option<usize> {
        self.fields.binary_search_by_key(&id, |f| f.id).ok()
    }

    /// Looks up a field by its snake_case name.
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The highest declared field id, or 0 for an empty message.
    pub fn max_id(&self) -> u32 {
        self.fields.last().map_or(0, |f| f.id)
    }
}

impl fmt::Display for MessageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "message {} {{", self.name)?;
        for field in &self.fields {
            writeln!(f, "  {field}")?;
        }
        write!(f, "}}")
    }
}

// ---------------------------------------------------------------------------
// EnumDescriptor
// ---------------------------------------------------------------------------

/// A compiled `enum` block. Values are sorted by number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDescriptor {
    pub name: String,
    pub values: Vec<(i32, String)>,
}

impl EnumDescriptor {
    /// Builds a descriptor, sorting values by number.
    pub fn new(name: impl Into<String>, mut values: Vec<(i32, String)>) -> Self {
        values.sort_by_key(|(n, _)| *n);
        Self {
            name: name.into(),
            values,
        }
    }

    /// The symbolic name for a wire value.
    pub fn name_of(&self, number: i32) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, name)| name.as_str())
    }

    /// The wire value for a symbolic name.
    pub fn number_of(&self, name: &str) -> Option<i32> {
        self.values
            .iter()
            .find(|(_, n)| n == name)
            .map(|(number, _)| *number)
    }

    /// The generated variant name for a wire value: PascalCase with the
    /// enum's own name removed, so `TYPING_TYPE_STARTED` in `TypingType`
    /// becomes `Started`.
    pub fn variant_name(&self, number: i32) -> Option<String> {
        self.name_of(number)
            .map(|symbol| crate::pascal_case(symbol, &self.name))
    }
}

impl fmt::Display for EnumDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "enum {} {{", self.name)?;
        for (number, name) in &self.values {
            writeln!(f, "  {name} = {number};")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(id: u32, name: &str, ty: &str, label: FieldLabel) -> FieldDescriptor {
        FieldDescriptor {
            id,
            name: name.into(),
            field_type: FieldType::parse(ty),
            label,
        }
    }

    #[test]
    fn test_field_type_parse_scalars_and_references() {
        assert_eq!(FieldType::parse("uint64"), FieldType::Uint64);
        assert_eq!(FieldType::parse("sfixed32"), FieldType::Sfixed32);
        assert_eq!(
            FieldType::parse("StateUpdate"),
            FieldType::Message("StateUpdate".into())
        );
        assert!(FieldType::parse("Foo").is_reference());
        assert!(!FieldType::parse("string").is_reference());
    }

    #[test]
    fn test_field_label_parse_rejects_unknown_keyword() {
        assert_eq!(FieldLabel::parse("repeated"), Some(FieldLabel::Repeated));
        assert_eq!(FieldLabel::parse("oneof"), None);
    }

    #[test]
    fn test_message_descriptor_sorts_fields_by_id() {
        let desc = MessageDescriptor::new(
            "Thing",
            vec![
                field(3, "c", "string", FieldLabel::Optional),
                field(1, "a", "int32", FieldLabel::Required),
            ],
        );
        assert_eq!(desc.fields[0].id, 1);
        assert_eq!(desc.max_id(), 3);
        assert_eq!(desc.field(3).map(|f| f.name.as_str()), Some("c"));
        assert!(desc.field(2).is_none());
        assert_eq!(desc.field_by_name("a").map(|f| f.id), Some(1));
    }

    #[test]
    fn test_message_descriptor_display_renders_schema_lines() {
        let desc = MessageDescriptor::new(
            "ConversationId",
            vec![field(1, "id", "string", FieldLabel::Optional)],
        );
        assert_eq!(
            desc.to_string(),
            "message ConversationId {\n  optional string id = 1;\n}"
        );
    }

    #[test]
    fn test_enum_descriptor_lookups() {
        let desc = EnumDescriptor::new(
            "TypingType",
            vec![
                (2, "TYPING_TYPE_PAUSED".into()),
                (1, "TYPING_TYPE_STARTED".into()),
            ],
        );
        assert_eq!(desc.values[0].0, 1);
        assert_eq!(desc.name_of(2), Some("TYPING_TYPE_PAUSED"));
        assert_eq!(desc.number_of("TYPING_TYPE_STARTED"), Some(1));
        assert_eq!(desc.variant_name(1).as_deref(), Some("Started"));
        assert_eq!(desc.variant_name(9), None);
    }
}
