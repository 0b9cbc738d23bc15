//! The push envelope: key-object decoding of the outer channel wrapper.
//!
//! Pushed arrays carry one envelope, a JSON object keyed by decimal field
//! tags. It usually arrives wrapped as `{"p": "<json text>"}`. Only two
//! tags matter:
//!
//! ```text
//! {"3": {"2": "<client id>"}}                       new client id
//! {"2": {"2": "[\"cbu\", [[<StateUpdate>], ...]]"}} batch of state updates
//! ```
//!
//! Anything else in the object is ignored. The batch itself is positional
//! and goes through the [`LiteCodec`].

use serde_json::{Map, Value as Json};

use crate::{LiteCodec, LiteRecord, ProtocolError, StateUpdate};

/// Discriminator of a client batch update.
pub const BATCH_UPDATE_DISCRIMINATOR: &str = "cbu";

/// What a decoded envelope carried.
///
/// Tags decode independently: a tag that fails lands in `rejected` and
/// the other is still delivered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    /// A newly assigned client id (tag 3 → tag 2).
    pub client_id: Option<String>,
    /// Pushed data (tag 2 → tag 2).
    pub push: Option<PushEvent>,
    /// Tags that were present but failed to decode, with the reason.
    pub rejected: Vec<RejectedTag>,
}

/// Pushed data carried by an envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// State updates in the order the server sent them.
    StateUpdateBatch(Vec<StateUpdate>),
    /// A payload we don't decode; the reason is kept for logging.
    Ignored(String),
}

/// An envelope tag that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedTag {
    pub tag: &'static str,
    pub reason: String,
}

impl Envelope {
    /// `true` if tags were present but none of them decoded.
    pub fn is_rejected(&self) -> bool {
        self.client_id.is_none() && self.push.is_none() && !self.rejected.is_empty()
    }
}

/// Decodes an envelope, either wrapped (`{"p": "..."}`) or bare.
///
/// Only a bad wrapper fails the whole envelope. Failures inside a tag are
/// reported through [`Envelope::rejected`].
pub fn decode_envelope(codec: &LiteCodec<'_>, raw: &Json) -> Result<Envelope, ProtocolError> {
    let object = unwrap_envelope(raw)?;
    let mut envelope = Envelope::default();

    if let Some(tag) = object.get("3") {
        match decode_client_id(tag) {
            Ok(client_id) => envelope.client_id = Some(client_id),
            Err(e) => envelope.rejected.push(RejectedTag {
                tag: "3",
                reason: e.to_string(),
            }),
        }
    }

    if let Some(tag) = object.get("2") {
        match decode_push(codec, tag) {
            Ok(push) => envelope.push = Some(push),
            Err(e) => envelope.rejected.push(RejectedTag {
                tag: "2",
                reason: e.to_string(),
            }),
        }
    }

    Ok(envelope)
}

fn decode_client_id(tag: &Json) -> Result<String, ProtocolError> {
    tag.get("2")
        .and_then(Json::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProtocolError::InvalidMessage("tag 3 without a client id string".into()))
}

fn decode_push(codec: &LiteCodec<'_>, tag: &Json) -> Result<PushEvent, ProtocolError> {
    let text = tag
        .get("2")
        .and_then(Json::as_str)
        .ok_or_else(|| ProtocolError::InvalidMessage("tag 2 without a payload string".into()))?;
    let payload: Json = serde_json::from_str(text).map_err(ProtocolError::Decode)?;
    match decode_batch(codec, &payload) {
        Ok(updates) => Ok(PushEvent::StateUpdateBatch(updates)),
        Err(ProtocolError::UnrecognizedDiscriminator(kind)) => {
            Ok(PushEvent::Ignored(format!("discriminator `{kind}`")))
        }
        Err(e) => Err(e),
    }
}

/// Decodes a `["cbu", ...]` payload into its state updates.
///
/// Any other discriminator fails with
/// [`UnrecognizedDiscriminator`](ProtocolError::UnrecognizedDiscriminator).
pub fn decode_batch(codec: &LiteCodec<'_>, payload: &Json) -> Result<Vec<StateUpdate>, ProtocolError> {
    let discriminator = match payload.as_array().and_then(|items| items.first()) {
        Some(Json::String(kind)) => kind.as_str(),
        Some(other) => return Err(ProtocolError::UnrecognizedDiscriminator(other.to_string())),
        None => return Err(ProtocolError::InvalidMessage("empty push payload".into())),
    };
    if discriminator != BATCH_UPDATE_DISCRIMINATOR {
        return Err(ProtocolError::UnrecognizedDiscriminator(discriminator.to_string()));
    }

    let batch = codec.decode("BatchUpdate", payload, true)?;
    batch
        .get_repeated("state_update")
        .iter()
        .filter_map(|v| v.as_message())
        .map(StateUpdate::from_message)
        .collect()
}

fn unwrap_envelope(raw: &Json) -> Result<Map<String, Json>, ProtocolError> {
    let Json::Object(object) = raw else {
        return Err(ProtocolError::InvalidMessage(format!(
            "envelope is not an object: {raw}"
        )));
    };

    match object.get("p") {
        Some(Json::String(text)) => match serde_json::from_str::<Json>(text).map_err(ProtocolError::Decode)? {
            Json::Object(inner) => Ok(inner),
            other => Err(ProtocolError::InvalidMessage(format!(
                "wrapped envelope is not an object: {other}"
            ))),
        },
        Some(other) => Err(ProtocolError::InvalidMessage(format!(
            "envelope wrapper is not a string: {other}"
        ))),
        None => Ok(object.clone()),
    }
}
