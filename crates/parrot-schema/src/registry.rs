//! The descriptor registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::{
    AccessorTable, CompileOutput, EnumDescriptor, FieldType, Message, MessageDescriptor,
    SchemaError, compile,
};

/// What a type name refers to.
#[derive(Debug, Clone)]
pub enum Resolved {
    Message(Arc<MessageDescriptor>),
    Enum(Arc<EnumDescriptor>),
}

/// Every compiled descriptor, looked up by name.
///
/// Built once and shared read-only. Type references inside messages are
/// stored as names and resolved here on use.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    messages: BTreeMap<String, Arc<MessageDescriptor>>,
    enums: BTreeMap<String, Arc<EnumDescriptor>>,
    accessors: BTreeMap<String, AccessorTable>,
}

impl Schema {
    /// Compiles `source` and registers everything that compiled. Errors for
    /// the blocks that didn't are returned alongside.
    pub fn from_source(source: &str) -> (Self, Vec<SchemaError>) {
        let mut output = compile(source);
        let errors = std::mem::take(&mut output.errors);
        (Self::from_output(output), errors)
    }

    /// Registers the descriptors in a compile output. A name declared twice
    /// keeps the later block.
    pub fn from_output(output: CompileOutput) -> Self {
        let mut schema = Self::default();

        for desc in output.enums {
            if schema.enums.contains_key(&desc.name) {
                tracing::warn!(name = %desc.name, "enum declared twice, keeping the later one");
            }
            schema.enums.insert(desc.name.clone(), Arc::new(desc));
        }

        for desc in output.messages {
            if schema.messages.contains_key(&desc.name) {
                tracing::warn!(name = %desc.name, "message declared twice, keeping the later one");
            }
            schema
                .accessors
                .insert(desc.name.clone(), AccessorTable::for_message(&desc));
            schema.messages.insert(desc.name.clone(), Arc::new(desc));
        }

        for (message, field, target) in schema.unresolved_references() {
            tracing::warn!(%message, %field, %target, "field refers to an undeclared type");
        }

        schema
    }

    pub fn message(&self, name: &str) -> Option<&Arc<MessageDescriptor>> {
        self.messages.get(name)
    }

    pub fn enumeration(&self, name: &str) -> Option<&Arc<EnumDescriptor>> {
        self.enums.get(name)
    }

    /// Resolves a `Message(name)` reference. Messages shadow enums.
    pub fn resolve(&self, name: &str) -> Result<Resolved, SchemaError> {
        if let Some(desc) = self.messages.get(name) {
            return Ok(Resolved::Message(Arc::clone(desc)));
        }
        if let Some(desc) = self.enums.get(name) {
            return Ok(Resolved::Enum(Arc::clone(desc)));
        }
        Err(SchemaError::UnresolvedType(name.to_string()))
    }

    /// An empty instance of the named message.
    pub fn new_message(&self, name: &str) -> Result<Message, SchemaError> {
        self.messages
            .get(name)
            .map(|desc| Message::new(Arc::clone(desc)))
            .ok_or_else(|| SchemaError::UnresolvedType(name.to_string()))
    }

    pub fn accessors(&self, name: &str) -> Option<&AccessorTable> {
        self.accessors.get(name)
    }

    /// Message descriptors in name order.
    pub fn messages(&self) -> impl Iterator<Item = &Arc<MessageDescriptor>> {
        self.messages.values()
    }

    /// Enum descriptors in name order.
    pub fn enums(&self) -> impl Iterator<Item = &Arc<EnumDescriptor>> {
        self.enums.values()
    }

    /// `(message, field, type)` for every reference to a name that is
    /// neither a message nor an enum.
    pub fn unresolved_references(&self) -> Vec<(String, String, String)> {
        let mut out = Vec::new();
        for desc in self.messages.values() {
            for field in &desc.fields {
                if let FieldType::Message(target) = &field.field_type {
                    if !self.messages.contains_key(target) && !self.enums.contains_key(target) {
                        out.push((desc.name.clone(), field.name.clone(), target.clone()));
                    }
                }
            }
        }
        out
    }
}

/// Renders the schema back to text: enums first, then messages.
impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for desc in self.enums.values() {
            if !first {
                writeln!(f)?;
            }
            first = false;
            writeln!(f, "{desc}")?;
        }
        for desc in self.messages.values() {
            if !first {
                writeln!(f)?;
            }
            first = false;
            writeln!(f, "{desc}")?;
        }
        Ok(())
    }
}
