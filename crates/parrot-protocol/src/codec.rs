//! The positional ("lite") codec.
//!
//! A lite message is a JSON array in which the element at index `i` is the
//! field with id `i + 1`:
//!
//! ```text
//! WatermarkNotification { sender_id = 1, conversation_id = 2, latest_read_timestamp = 3 }
//!
//! [["gaia", "chat"], ["conv-1"], "1500000000000000"]
//! ```
//!
//! Payloads that open with a type discriminator string (`["cbu", ...]`,
//! `["csrcrp", ...]`) are decoded with `ignore_first` set, which shifts the
//! mapping so index `i` holds field `i`.
//!
//! Decoding is driven entirely by descriptors from a [`Schema`]; nothing
//! here knows about specific message types. The key-object form used by
//! the outer push envelope lives in [`envelope`](crate::envelope) and stays
//! a separate code path.

use std::sync::Arc;

use parrot_schema::{
    FieldDescriptor, FieldLabel, FieldType, FieldValue, Message, MessageDescriptor, Resolved,
    Schema, SchemaError, Value,
};
use serde_json::Value as Json;

use crate::{ProtocolError, ResponseStatus, service_schema};

/// Decodes lite arrays against the descriptors of one schema.
///
/// Cheap to copy: it only borrows the schema.
#[derive(Debug, Clone, Copy)]
pub struct LiteCodec<'s> {
    schema: &'s Schema,
}

impl LiteCodec<'static> {
    /// A codec over the bundled service schema.
    pub fn service() -> Self {
        Self::new(service_schema())
    }
}

impl<'s> LiteCodec<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    /// Decodes `raw` as the named message type.
    pub fn decode(
        &self,
        message: &str,
        raw: &Json,
        ignore_first: bool,
    ) -> Result<Message, ProtocolError> {
        let desc = self
            .schema
            .message(message)
            .ok_or_else(|| SchemaError::UnresolvedType(message.to_string()))?;
        self.decode_with(desc, raw, ignore_first)
    }

    /// Decodes `raw` against a descriptor.
    ///
    /// Fields are walked in id order. `null` and missing positions leave a
    /// field unset; a required field left unset fails the whole decode.
    /// Non-null elements at positions the descriptor doesn't declare end up
    /// in the message's unknown bag.
    pub fn decode_with(
        &self,
        desc: &Arc<MessageDescriptor>,
        raw: &Json,
        ignore_first: bool,
    ) -> Result<Message, ProtocolError> {
        let Json::Array(items) = raw else {
            return Err(mismatch(&desc.name, "<root>", "array", raw).into());
        };

        let mut msg = Message::new(Arc::clone(desc));

        for field in &desc.fields {
            let Some(elem) = position_of(field.id, ignore_first)
                .and_then(|index| items.get(index))
                .filter(|v| !v.is_null())
            else {
                continue;
            };

            let value = match field.label {
                FieldLabel::Repeated => {
                    let Json::Array(elems) = elem else {
                        return Err(mismatch(&desc.name, &field.name, "array", elem).into());
                    };
                    let values = elems
                        .iter()
                        .filter(|e| !e.is_null())
                        .map(|e| self.decode_value(desc, field, e))
                        .collect::<Result<Vec<_>, _>>()?;
                    FieldValue::Repeated(values)
                }
                FieldLabel::Optional | FieldLabel::Required => {
                    FieldValue::Single(self.decode_value(desc, field, elem)?)
                }
            };
            msg.set(field.id, value)?;
        }

        for (index, elem) in items.iter().enumerate() {
            if elem.is_null() || (ignore_first && index == 0) {
                continue;
            }
            let id = if ignore_first { index } else { index + 1 };
            let Ok(id) = u32::try_from(id) else { break };
            if desc.field(id).is_none() {
                msg.insert_unknown(id, elem.clone())?;
            }
        }

        msg.check_required()?;
        Ok(msg)
    }

    fn decode_value(
        &self,
        desc: &MessageDescriptor,
        field: &FieldDescriptor,
        elem: &Json,
    ) -> Result<Value, ProtocolError> {
        if let FieldType::Message(target) = &field.field_type {
            return match self.schema.resolve(target)? {
                Resolved::Message(nested) => {
                    Ok(Value::Message(self.decode_with(&nested, elem, false)?))
                }
                Resolved::Enum(_) => elem
                    .as_i64()
                    .and_then(|n| i32::try_from(n).ok())
                    .map(Value::Enum)
                    .ok_or_else(|| mismatch(&desc.name, &field.name, target, elem).into()),
            };
        }

        let ty = &field.field_type;
        let value = match ty {
            FieldType::String => elem.as_str().map(|s| Value::String(s.to_string())),
            FieldType::Bytes => decode_bytes(elem).map(Value::Bytes),
            FieldType::Bool => match elem {
                Json::Bool(b) => Some(Value::Bool(*b)),
                Json::Number(n) => match n.as_u64() {
                    Some(0) => Some(Value::Bool(false)),
                    Some(1) => Some(Value::Bool(true)),
                    _ => None,
                },
                _ => None,
            },
            FieldType::Double => elem.as_f64().map(Value::Double),
            FieldType::Float => elem.as_f64().map(|v| Value::Float(v as f32)),
            t if t.is_signed_32() => elem
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .map(Value::Int32),
            t if t.is_unsigned_32() => elem
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(Value::Uint32),
            t if t.is_signed_64() => wide_int(elem, Json::as_i64).map(Value::Int64),
            t if t.is_unsigned_64() => wide_int(elem, Json::as_u64).map(Value::Uint64),
            _ => None,
        };

        value.ok_or_else(|| mismatch(&desc.name, &field.name, ty.as_str(), elem).into())
    }

    /// Encodes a message back to its positional form.
    ///
    /// Field `n` goes to index `n - 1`, unset fields become `null`, unknown
    /// positions are written back where they were found. Trailing unset
    /// and empty repeated fields are dropped.
    pub fn encode(&self, msg: &Message) -> Json {
        let last_set = msg
            .fields()
            .filter(|(_, slot)| match slot {
                FieldValue::Unset => false,
                FieldValue::Single(_) => true,
                FieldValue::Repeated(vs) => !vs.is_empty(),
            })
            .map(|(f, _)| f.id)
            .max()
            .unwrap_or(0);
        let last_unknown = msg.unknown().keys().next_back().copied().unwrap_or(0);
        let len = last_set.max(last_unknown) as usize;

        let mut items = vec![Json::Null; len];
        for (field, slot) in msg.fields() {
            let Some(index) = position_of(field.id, false) else { continue };
            if index >= len {
                break;
            }
            match slot {
                FieldValue::Unset => {}
                FieldValue::Single(v) => items[index] = self.encode_value(v),
                FieldValue::Repeated(vs) => {
                    items[index] = Json::Array(vs.iter().map(|v| self.encode_value(v)).collect());
                }
            }
        }
        for (id, raw) in msg.unknown() {
            if let Some(index) = position_of(*id, false) {
                items[index] = raw.clone();
            }
        }

        Json::Array(items)
    }

    fn encode_value(&self, value: &Value) -> Json {
        match value {
            Value::String(s) => Json::from(s.as_str()),
            Value::Bytes(b) => match std::str::from_utf8(b) {
                Ok(text) => Json::from(text),
                Err(_) => Json::Array(b.iter().map(|&octet| Json::from(octet)).collect()),
            },
            Value::Bool(b) => Json::from(*b),
            Value::Double(v) => Json::from(*v),
            Value::Float(v) => Json::from(f64::from(*v)),
            Value::Int32(v) | Value::Enum(v) => Json::from(*v),
            Value::Int64(v) => Json::from(*v),
            Value::Uint32(v) => Json::from(*v),
            Value::Uint64(v) => Json::from(*v),
            Value::Message(m) => self.encode(m),
        }
    }

    /// Decodes a reply body.
    ///
    /// Replies are lite arrays, usually led by a discriminator string
    /// (skipped when present). A response header whose status isn't `OK`
    /// is logged; the record is still returned so callers can inspect it.
    pub fn decode_response(&self, message: &str, body: &[u8]) -> Result<Message, ProtocolError> {
        let raw: Json = serde_json::from_slice(body).map_err(ProtocolError::Decode)?;
        tracing::trace!(%message, %raw, "decoding response");

        let ignore_first = matches!(
            raw.as_array().and_then(|items| items.first()),
            Some(Json::String(_))
        );
        let msg = self.decode(message, &raw, ignore_first)?;

        let status = response_status(&msg);
        if status != Some(ResponseStatus::Ok) {
            tracing::warn!(%message, ?status, "unexpected response status");
        }
        Ok(msg)
    }
}

/// The status in a response's header (field 1 → field 1), if present.
pub fn response_status(msg: &Message) -> Option<ResponseStatus> {
    msg.get_message("response_header")
        .and_then(|header| header.get_enum("status"))
        .and_then(ResponseStatus::from_wire)
}

/// Array index of field `id`. Without a leading discriminator id 0 has
/// no position.
fn position_of(id: u32, ignore_first: bool) -> Option<usize> {
    let id = id as usize;
    if ignore_first { Some(id) } else { id.checked_sub(1) }
}

/// 64-bit integers arrive as numbers or, when they'd lose precision in a
/// double, as decimal strings.
fn wide_int<T: std::str::FromStr>(elem: &Json, as_number: fn(&Json) -> Option<T>) -> Option<T> {
    match elem {
        Json::String(s) => s.parse().ok(),
        other => as_number(other),
    }
}

/// Bytes travel as strings; arrays of octets are accepted too.
fn decode_bytes(elem: &Json) -> Option<Vec<u8>> {
    match elem {
        Json::String(s) => Some(s.as_bytes().to_vec()),
        Json::Array(items) => items
            .iter()
            .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
            .collect(),
        _ => None,
    }
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn mismatch(message: &str, field: &str, expected: &str, found: &Json) -> SchemaError {
    SchemaError::TypeMismatch {
        message: message.to_string(),
        field: field.to_string(),
        expected: expected.to_string(),
        found: json_kind(found).to_string(),
    }
}
