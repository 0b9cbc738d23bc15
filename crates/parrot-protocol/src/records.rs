//! Typed views over decoded messages.
//!
//! The codec produces generic [`Message`]s. The engine only needs a handful
//! of fields out of them, so each record here pulls those fields out by
//! name through [`LiteRecord::from_message`]. Records that are handed on to
//! subscribers keep the underlying message so nothing is lost.

use parrot_schema::Message;

use crate::{ActiveClientState, FocusType, ProtocolError, TypingType};

/// A record read out of a decoded message of type [`MESSAGE`](Self::MESSAGE).
pub trait LiteRecord: Sized {
    /// Schema name of the message this record is read from.
    const MESSAGE: &'static str;

    /// Reads the record's fields. Fails if `msg` is some other type.
    fn from_message(msg: &Message) -> Result<Self, ProtocolError>;
}

fn expect_type(msg: &Message, expected: &str) -> Result<(), ProtocolError> {
    if msg.name() == expected {
        Ok(())
    } else {
        Err(ProtocolError::InvalidMessage(format!(
            "expected {expected}, got {}",
            msg.name()
        )))
    }
}

fn nested<R: LiteRecord>(msg: &Message, field: &str) -> Result<Option<R>, ProtocolError> {
    msg.get_message(field).map(R::from_message).transpose()
}

fn conversation_id(msg: &Message) -> Option<String> {
    msg.get_message("conversation_id")
        .and_then(|c| c.get_str("id"))
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A participant, identified by gaia id and chat id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ParticipantId {
    pub gaia_id: Option<String>,
    pub chat_id: Option<String>,
}

impl LiteRecord for ParticipantId {
    const MESSAGE: &'static str = "ParticipantId";

    fn from_message(msg: &Message) -> Result<Self, ProtocolError> {
        expect_type(msg, Self::MESSAGE)?;
        Ok(Self {
            gaia_id: msg.get_str("gaia_id").map(str::to_string),
            chat_id: msg.get_str("chat_id").map(str::to_string),
        })
    }
}

/// The signed-in account, from a `GetSelfInfoResponse`.
#[derive(Debug, Clone, PartialEq)]
pub struct SelfInfo {
    pub id: Option<ParticipantId>,
    pub display_name: Option<String>,
    pub emails: Vec<String>,
    pub message: Message,
}

impl SelfInfo {
    /// The primary email address, used to name this client to the server.
    pub fn email(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }
}

impl LiteRecord for SelfInfo {
    const MESSAGE: &'static str = "GetSelfInfoResponse";

    fn from_message(msg: &Message) -> Result<Self, ProtocolError> {
        expect_type(msg, Self::MESSAGE)?;
        let entity = msg.get_message("self_entity");
        let properties = entity.and_then(|e| e.get_message("properties"));

        Ok(Self {
            id: entity.map(|e| nested(e, "id")).transpose()?.flatten(),
            display_name: properties
                .and_then(|p| p.get_str("display_name"))
                .map(str::to_string),
            emails: properties
                .map(|p| {
                    p.get_repeated("email")
                        .iter()
                        .filter_map(|v| v.as_str())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            message: msg.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Common header of every state update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateUpdateHeader {
    pub active_client_state: Option<ActiveClientState>,
    pub request_trace_id: Option<String>,
    pub current_server_time: Option<u64>,
}

impl LiteRecord for StateUpdateHeader {
    const MESSAGE: &'static str = "StateUpdateHeader";

    fn from_message(msg: &Message) -> Result<Self, ProtocolError> {
        expect_type(msg, Self::MESSAGE)?;
        Ok(Self {
            active_client_state: msg
                .get_enum("active_client_state")
                .and_then(ActiveClientState::from_wire),
            request_trace_id: msg.get_str("request_trace_id").map(str::to_string),
            current_server_time: msg.get_u64("current_server_time"),
        })
    }
}

/// Someone read a conversation up to `latest_read_timestamp`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatermarkNotification {
    pub sender_id: Option<ParticipantId>,
    pub conversation_id: Option<String>,
    pub latest_read_timestamp: Option<u64>,
}

impl LiteRecord for WatermarkNotification {
    const MESSAGE: &'static str = "WatermarkNotification";

    fn from_message(msg: &Message) -> Result<Self, ProtocolError> {
        expect_type(msg, Self::MESSAGE)?;
        Ok(Self {
            sender_id: nested(msg, "sender_id")?,
            conversation_id: conversation_id(msg),
            latest_read_timestamp: msg.get_u64("latest_read_timestamp"),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypingNotification {
    pub conversation_id: Option<String>,
    pub sender_id: Option<ParticipantId>,
    pub timestamp: Option<u64>,
    pub typing: Option<TypingType>,
}

impl LiteRecord for TypingNotification {
    const MESSAGE: &'static str = "SetTypingNotification";

    fn from_message(msg: &Message) -> Result<Self, ProtocolError> {
        expect_type(msg, Self::MESSAGE)?;
        Ok(Self {
            conversation_id: conversation_id(msg),
            sender_id: nested(msg, "sender_id")?,
            timestamp: msg.get_u64("timestamp"),
            typing: msg.get_enum("type").and_then(TypingType::from_wire),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusNotification {
    pub conversation_id: Option<String>,
    pub sender_id: Option<ParticipantId>,
    pub timestamp: Option<u64>,
    pub focus: Option<FocusType>,
}

impl LiteRecord for FocusNotification {
    const MESSAGE: &'static str = "SetFocusNotification";

    fn from_message(msg: &Message) -> Result<Self, ProtocolError> {
        expect_type(msg, Self::MESSAGE)?;
        Ok(Self {
            conversation_id: conversation_id(msg),
            sender_id: nested(msg, "sender_id")?,
            timestamp: msg.get_u64("timestamp"),
            focus: msg.get_enum("type").and_then(FocusType::from_wire),
        })
    }
}

/// One entry of a pushed batch.
///
/// The commonly used notifications are read out eagerly; everything else
/// (events, conversation changes, presence) stays in [`message`](Self::message).
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    pub header: Option<StateUpdateHeader>,
    pub watermark: Option<WatermarkNotification>,
    pub typing: Option<TypingNotification>,
    pub focus: Option<FocusNotification>,
    pub message: Message,
}

impl StateUpdate {
    /// The active-client state the server reported, if any.
    pub fn active_client_state(&self) -> Option<ActiveClientState> {
        self.header.as_ref().and_then(|h| h.active_client_state)
    }

    /// The new event carried by an event notification.
    pub fn event(&self) -> Option<&Message> {
        self.message
            .get_message("event_notification")
            .and_then(|n| n.get_message("event"))
    }
}

impl LiteRecord for StateUpdate {
    const MESSAGE: &'static str = "StateUpdate";

    fn from_message(msg: &Message) -> Result<Self, ProtocolError> {
        expect_type(msg, Self::MESSAGE)?;
        Ok(Self {
            header: nested(msg, "state_update_header")?,
            watermark: nested(msg, "watermark_notification")?,
            typing: nested(msg, "typing_notification")?,
            focus: nested(msg, "focus_notification")?,
            message: msg.clone(),
        })
    }
}
