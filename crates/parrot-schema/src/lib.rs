//! Schema compiler and descriptor runtime for Parrot.
//!
//! The chat service speaks a protobuf dialect with no published schema, so
//! we keep a small interface-definition file of our own and compile it into
//! descriptors at startup:
//!
//! - **Compiler** ([`compile`]) — parses `enum` / `message` blocks into
//!   [`EnumDescriptor`]s and [`MessageDescriptor`]s. A malformed block is
//!   reported in [`CompileOutput::errors`] and the rest of the file still
//!   compiles.
//! - **Descriptors** ([`FieldDescriptor`], [`FieldType`], [`FieldLabel`]) —
//!   the immutable `{id → (name, type, label)}` tables.
//! - **Registry** ([`Schema`]) — resolves type names to descriptors and
//!   hands out empty [`Message`]s.
//! - **Messages** ([`Message`], [`Value`], [`FieldValue`]) — generic records
//!   with get/set reflection by field id or name.
//! - **Accessors** ([`AccessorTable`]) — the generated name ↔ id ↔ camelCase
//!   table for each message.
//!
//! ```text
//! schema text → compile() → Schema → Message (filled in by the codec)
//! ```

mod accessors;
mod compiler;
mod error;
mod message;
mod registry;
mod types;

pub use accessors::{AccessorEntry, AccessorTable, camel_case, pascal_case};
pub use compiler::{CompileOutput, compile, strip_comments};
pub use error::SchemaError;
pub use message::{FieldValue, Message, Value};
pub use registry::{Resolved, Schema};
pub use types::{
    EnumDescriptor, FieldDescriptor, FieldLabel, FieldType, MessageDescriptor,
};
