//! Generic message values with reflection by field id or name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::{FieldDescriptor, FieldLabel, FieldType, MessageDescriptor, SchemaError};

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A single field value.
///
/// Zig-zag and fixed-width integer kinds share the plain variants:
/// `sint32`/`sfixed32` hold an `Int32`, `fixed64` holds a `Uint64`, and so
/// on. Enum-typed fields hold their wire number in `Enum`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Bytes(Vec<u8>),
    Bool(bool),
    Double(f64),
    Float(f32),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Enum(i32),
    Message(Message),
}

impl Value {
    /// Short name of the variant, used in mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Bool(_) => "bool",
            Self::Double(_) => "double",
            Self::Float(_) => "float",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Uint32(_) => "uint32",
            Self::Uint64(_) => "uint64",
            Self::Enum(_) => "enum",
            Self::Message(_) => "message",
        }
    }

    /// Whether this value can be stored in a field of type `ty`.
    ///
    /// A `Message(name)` field takes either an enum number or a message
    /// whose descriptor is called `name`: the descriptor alone can't tell
    /// which one the name refers to.
    pub fn fits(&self, ty: &FieldType) -> bool {
        match (self, ty) {
            (Self::String(_), FieldType::String) => true,
            (Self::Bytes(_), FieldType::Bytes) => true,
            (Self::Bool(_), FieldType::Bool) => true,
            (Self::Double(_), FieldType::Double) => true,
            (Self::Float(_), FieldType::Float) => true,
            (Self::Int32(_), t) => t.is_signed_32(),
            (Self::Int64(_), t) => t.is_signed_64(),
            (Self::Uint32(_), t) => t.is_unsigned_32(),
            (Self::Uint64(_), t) => t.is_unsigned_64(),
            (Self::Enum(_), FieldType::Message(_)) => true,
            (Self::Message(m), FieldType::Message(name)) => m.name() == name,
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Self::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Any integer kind that is non-negative, widened to `u64`.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::Uint64(v) => Some(v),
            Self::Uint32(v) => Some(u64::from(v)),
            Self::Int64(v) => u64::try_from(v).ok(),
            Self::Int32(v) | Self::Enum(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Any integer kind that fits, widened to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int64(v) => Some(v),
            Self::Int32(v) | Self::Enum(v) => Some(i64::from(v)),
            Self::Uint32(v) => Some(i64::from(v)),
            Self::Uint64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Enum wire number. Plain `int32` values are accepted too.
    pub fn as_enum(&self) -> Option<i32> {
        match *self {
            Self::Enum(v) | Self::Int32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Double(v) => Some(v),
            Self::Float(v) => Some(f64::from(v)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// FieldValue
// ---------------------------------------------------------------------------

/// The content of one field slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    #[default]
    Unset,
    Single(Value),
    Repeated(Vec<Value>),
}

impl FieldValue {
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// The value of a singular field, if set.
    pub fn single(&self) -> Option<&Value> {
        match self {
            Self::Single(v) => Some(v),
            _ => None,
        }
    }

    /// The elements of a repeated field. Empty for anything else.
    pub fn repeated(&self) -> &[Value] {
        match self {
            Self::Repeated(items) => items,
            _ => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// An instance of a message type.
///
/// Slots line up with the descriptor's fields. Positions the decoder saw
/// that the descriptor doesn't declare are kept verbatim in the unknown
/// bag instead of being dropped.
#[derive(Clone)]
pub struct Message {
    descriptor: Arc<MessageDescriptor>,
    slots: Vec<FieldValue>,
    unknown: BTreeMap<u32, serde_json::Value>,
}

impl Message {
    /// An empty message: optional fields unset, repeated fields empty.
    pub fn new(descriptor: Arc<MessageDescriptor>) -> Self {
        let slots = descriptor
            .fields
            .iter()
            .map(|f| match f.label {
                FieldLabel::Repeated => FieldValue::Repeated(Vec::new()),
                _ => FieldValue::Unset,
            })
            .collect();
        Self {
            descriptor,
            slots,
            unknown: BTreeMap::new(),
        }
    }

    /// Builds a message from `(id, value)` pairs, then checks that every
    /// required field ended up set.
    pub fn from_fields(
        descriptor: Arc<MessageDescriptor>,
        fields: impl IntoIterator<Item = (u32, FieldValue)>,
    ) -> Result<Self, SchemaError> {
        let mut msg = Self::new(descriptor);
        for (id, value) in fields {
            msg.set(id, value)?;
        }
        msg.check_required()?;
        Ok(msg)
    }

    pub fn descriptor(&self) -> &Arc<MessageDescriptor> {
        &self.descriptor
    }

    /// The message type name.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Reads a field by id.
    pub fn get(&self, id: u32) -> Result<&FieldValue, SchemaError> {
        let idx = self.slot(id)?;
        Ok(&self.slots[idx])
    }

    /// Reads a field by snake_case name.
    pub fn get_by_name(&self, name: &str) -> Result<&FieldValue, SchemaError> {
        let id = self.id_of(name)?;
        self.get(id)
    }

    /// Writes a field by id.
    ///
    /// The value's shape must agree with the field: `Single` for optional
    /// and required fields, `Repeated` for repeated ones, and every element
    /// must fit the declared type. `Unset` clears the field (a repeated
    /// field goes back to empty).
    pub fn set(&mut self, id: u32, value: FieldValue) -> Result<(), SchemaError> {
        let idx = self.slot(id)?;
        let field = &self.descriptor.fields[idx];

        let value = match (field.label, value) {
            (FieldLabel::Repeated, FieldValue::Unset) => FieldValue::Repeated(Vec::new()),
            (FieldLabel::Repeated, FieldValue::Repeated(items)) => {
                if let Some(bad) = items.iter().find(|v| !v.fits(&field.field_type)) {
                    return Err(self.mismatch(field, bad.kind()));
                }
                FieldValue::Repeated(items)
            }
            (FieldLabel::Repeated, FieldValue::Single(v)) => {
                return Err(self.mismatch(field, &format!("single {}", v.kind())));
            }
            (_, FieldValue::Unset) => FieldValue::Unset,
            (_, FieldValue::Single(v)) => {
                if !v.fits(&field.field_type) {
                    return Err(self.mismatch(field, v.kind()));
                }
                FieldValue::Single(v)
            }
            (_, FieldValue::Repeated(_)) => {
                return Err(self.mismatch(field, "repeated"));
            }
        };

        self.slots[idx] = value;
        Ok(())
    }

    /// Writes a field by snake_case name.
    pub fn set_by_name(&mut self, name: &str, value: FieldValue) -> Result<(), SchemaError> {
        let id = self.id_of(name)?;
        self.set(id, value)
    }

    /// Fails with `RequiredFieldMissing` for the first unset required field.
    pub fn check_required(&self) -> Result<(), SchemaError> {
        for (field, slot) in self.fields() {
            if field.label == FieldLabel::Required && slot.is_unset() {
                return Err(SchemaError::RequiredFieldMissing {
                    message: self.descriptor.name.clone(),
                    field: field.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Declared fields paired with their current values, in id order.
    pub fn fields(&self) -> impl Iterator<Item = (&FieldDescriptor, &FieldValue)> {
        self.descriptor.fields.iter().zip(self.slots.iter())
    }

    /// Undeclared positions seen while decoding, keyed by field id.
    pub fn unknown(&self) -> &BTreeMap<u32, serde_json::Value> {
        &self.unknown
    }

    /// Stores a raw element at an undeclared position.
    ///
    /// Ids start at 1, and a declared id belongs to its field, so both are
    /// rejected with [`SchemaError::FieldNotFound`].
    pub fn insert_unknown(&mut self, id: u32, raw: serde_json::Value) -> Result<(), SchemaError> {
        if id == 0 || self.descriptor.field(id).is_some() {
            return Err(SchemaError::FieldNotFound {
                message: self.descriptor.name.clone(),
                field: format!("unknown position {id}"),
            });
        }
        self.unknown.insert(id, raw);
        Ok(())
    }

    // -- Convenience readers ------------------------------------------------
    //
    // These collapse "not declared", "unset" and "wrong kind" into `None`,
    // which is what the typed records want.

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.single(name).and_then(Value::as_str)
    }

    pub fn get_message(&self, name: &str) -> Option<&Message> {
        self.single(name).and_then(Value::as_message)
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.single(name).and_then(Value::as_u64)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.single(name).and_then(Value::as_i64)
    }

    pub fn get_enum(&self, name: &str) -> Option<i32> {
        self.single(name).and_then(Value::as_enum)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.single(name).and_then(Value::as_bool)
    }

    pub fn get_repeated(&self, name: &str) -> &[Value] {
        match self.get_by_name(name) {
            Ok(slot) => slot.repeated(),
            Err(_) => &[],
        }
    }

    fn single(&self, name: &str) -> Option<&Value> {
        self.get_by_name(name).ok().and_then(FieldValue::single)
    }

    // -- Internals ----------------------------------------------------------

    fn slot(&self, id: u32) -> Result<usize, SchemaError> {
        self.descriptor
            .index_of(id)
            .ok_or_else(|| SchemaError::FieldNotFound {
                message: self.descriptor.name.clone(),
                field: id.to_string(),
            })
    }

    fn id_of(&self, name: &str) -> Result<u32, SchemaError> {
        self.descriptor
            .field_by_name(name)
            .map(|f| f.id)
            .ok_or_else(|| SchemaError::FieldNotFound {
                message: self.descriptor.name.clone(),
                field: name.to_string(),
            })
    }

    fn mismatch(&self, field: &FieldDescriptor, found: &str) -> SchemaError {
        SchemaError::TypeMismatch {
            message: self.descriptor.name.clone(),
            field: field.name.clone(),
            expected: format!("{} {}", field.label, field.field_type),
            found: found.to_string(),
        }
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor.name == other.descriptor.name
            && self.slots == other.slots
            && self.unknown == other.unknown
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct(&self.descriptor.name);
        for (field, slot) in self.fields() {
            match slot {
                FieldValue::Unset => {}
                FieldValue::Single(v) => {
                    out.field(&field.name, v);
                }
                FieldValue::Repeated(items) if !items.is_empty() => {
                    out.field(&field.name, items);
                }
                FieldValue::Repeated(_) => {}
            }
        }
        if !self.unknown.is_empty() {
            out.field("unknown", &self.unknown);
        }
        out.finish()
    }
}
