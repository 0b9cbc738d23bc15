//! The bundled service schema.

use std::sync::LazyLock;

use parrot_schema::Schema;

/// Schema text for every message the service sends us.
pub const SERVICE_SCHEMA_SOURCE: &str = include_str!("../schema/hangouts.proto");

static SERVICE_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    let (schema, errors) = Schema::from_source(SERVICE_SCHEMA_SOURCE);
    for error in &errors {
        tracing::error!(%error, "bundled schema block failed to compile");
    }
    tracing::debug!(
        messages = schema.messages().count(),
        enums = schema.enums().count(),
        "service schema loaded"
    );
    schema
});

/// The compiled service schema. Compiled on first use and shared after.
pub fn service_schema() -> &'static Schema {
    &SERVICE_SCHEMA
}
