//! Wire protocol for Parrot.
//!
//! Everything between raw JSON off the wire and typed records:
//!
//! - **Codec** ([`LiteCodec`]) — positional ("lite") arrays ↔ generic
//!   [`Message`](parrot_schema::Message)s, driven by schema descriptors.
//! - **Envelope** ([`decode_envelope`], [`Envelope`], [`PushEvent`]) — the
//!   key-object wrapper around pushed data.
//! - **Records** ([`StateUpdate`], [`WatermarkNotification`], [`SelfInfo`],
//!   ...) — the fields the engine reads, pulled out via [`LiteRecord`].
//! - **Enums** ([`ActiveClientState`], [`TypingType`], ...) — wire enums
//!   the engine reads or writes as integers.
//! - **Schema** ([`service_schema`]) — the bundled, lazily compiled message
//!   schema for the service.
//!
//! ```text
//! Transport (raw JSON) → Protocol (Envelope / Message → records) → Engine
//! ```

mod codec;
mod enums;
mod envelope;
mod error;
mod records;
mod schema;

pub use codec::{LiteCodec, response_status};
pub use enums::{
    ActiveClientState, DeliveryMediumType, FocusType, NotificationLevel, OffTheRecordStatus,
    ResponseStatus, SegmentType, TypingType,
};
pub use envelope::{
    BATCH_UPDATE_DISCRIMINATOR, Envelope, PushEvent, RejectedTag, decode_batch, decode_envelope,
};
pub use error::ProtocolError;
pub use records::{
    FocusNotification, LiteRecord, ParticipantId, SelfInfo, StateUpdate, StateUpdateHeader,
    TypingNotification, WatermarkNotification,
};
pub use schema::{SERVICE_SCHEMA_SOURCE, service_schema};
