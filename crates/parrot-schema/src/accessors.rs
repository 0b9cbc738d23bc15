//! Generated accessor tables.
//!
//! Each message gets a static table mapping snake_case field names to ids
//! and ids to camelCase accessor names. Tools can dump it (see the
//! `schemac` demo) instead of generating source code.

use std::collections::HashMap;

use serde::Serialize;

use crate::{FieldLabel, FieldType, MessageDescriptor};

/// Converts `snake_case` to `camelCase`: the first component is kept as
/// written, each later component is capitalized.
pub fn camel_case(name: &str) -> String {
    let mut parts = name.split('_');
    let mut out = parts.next().unwrap_or_default().to_string();
    for part in parts {
        out.push_str(&capitalize(part));
    }
    out
}

/// Converts an enum symbol (`ACTIVE_CLIENT_STATE_IS_ACTIVE`) to PascalCase
/// and removes every case-insensitive occurrence of `strip` (usually the
/// enum's own name). Falls back to the full PascalCase form when stripping
/// would leave nothing.
pub fn pascal_case(symbol: &str, strip: &str) -> String {
    let full: String = symbol.split('_').map(capitalize).collect();
    if strip.is_empty() {
        return full;
    }

    let needle = strip.to_ascii_lowercase();
    let mut out = String::with_capacity(full.len());
    let mut rest = full.as_str();
    while let Some(pos) = rest.to_ascii_lowercase().find(&needle) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + needle.len()..];
    }
    out.push_str(rest);

    if out.is_empty() { full } else { out }
}

/// First letter upper-cased, the rest lower-cased.
fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// One row of an [`AccessorTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessorEntry {
    pub id: u32,
    pub name: String,
    pub camel_name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: FieldLabel,
}

/// Name ↔ id ↔ camelCase table for one message type.
#[derive(Debug, Clone, Serialize)]
pub struct AccessorTable {
    pub message: String,
    pub entries: Vec<AccessorEntry>,
    #[serde(skip)]
    by_name: HashMap<String, u32>,
}

impl AccessorTable {
    /// Builds the table for a descriptor. Entries are in id order.
    pub fn for_message(desc: &MessageDescriptor) -> Self {
        let entries: Vec<AccessorEntry> = desc
            .fields
            .iter()
            .map(|f| AccessorEntry {
                id: f.id,
                name: f.name.clone(),
                camel_name: f.camel_name(),
                field_type: f.field_type.clone(),
                label: f.label,
            })
            .collect();
        let by_name = entries.iter().map(|e| (e.name.clone(), e.id)).collect();
        Self {
            message: desc.name.clone(),
            entries,
            by_name,
        }
    }

    /// Field id for a snake_case name.
    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    /// camelCase accessor name for a field id.
    pub fn camel_name_of(&self, id: u32) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.camel_name.as_str())
    }
}
