//! Outbound request bodies.
//!
//! Requests are built by hand as positional arrays, one builder per
//! endpoint. Nothing here goes through the codec: the bodies only need to
//! match what the server accepts, and several of them carry constants with
//! no schema counterpart. Every body opens with the shared header:
//!
//! ```text
//! [[null, null, client_name, null, null, null], [client_id | null, null], null, language]
//! ```
//!
//! Builders are pure. The caller supplies the client-generated id (`cgid`)
//! and timestamps (microseconds since the Unix epoch) so bodies can be
//! checked exactly.

use std::fmt;

use parrot_protocol::{
    DeliveryMediumType, FocusType, NotificationLevel, OffTheRecordStatus, SegmentType, TypingType,
};
use rand::Rng;
use serde_json::{Value as Json, json};

use crate::ClientConfig;

/// A random id the server uses to deduplicate retried requests.
pub fn client_generated_id() -> u32 {
    rand::rng().random()
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// Every API endpoint the engine calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    AddUser,
    CreateConversation,
    DeleteConversation,
    EasterEgg,
    GetConversation,
    GetEntityById,
    GetSelfInfo,
    GetSuggestedEntities,
    QueryPresence,
    RemoveUser,
    RenameConversation,
    SearchEntities,
    SendChatMessage,
    SetActiveClient,
    SetConversationNotificationLevel,
    SetFocus,
    SetPresence,
    SetTyping,
    SyncAllNewEvents,
    SyncRecentConversations,
    UpdateWatermark,
}

impl Endpoint {
    pub const ALL: [Endpoint; 21] = [
        Self::AddUser,
        Self::CreateConversation,
        Self::DeleteConversation,
        Self::EasterEgg,
        Self::GetConversation,
        Self::GetEntityById,
        Self::GetSelfInfo,
        Self::GetSuggestedEntities,
        Self::QueryPresence,
        Self::RemoveUser,
        Self::RenameConversation,
        Self::SearchEntities,
        Self::SendChatMessage,
        Self::SetActiveClient,
        Self::SetConversationNotificationLevel,
        Self::SetFocus,
        Self::SetPresence,
        Self::SetTyping,
        Self::SyncAllNewEvents,
        Self::SyncRecentConversations,
        Self::UpdateWatermark,
    ];

    /// Path passed to [`Transport::request`](parrot_transport::Transport::request).
    pub fn path(self) -> &'static str {
        match self {
            Self::AddUser => "conversations/adduser",
            Self::CreateConversation => "conversations/createconversation",
            Self::DeleteConversation => "conversations/deleteconversation",
            Self::EasterEgg => "conversations/easteregg",
            Self::GetConversation => "conversations/getconversation",
            Self::GetEntityById => "contacts/getentitybyid",
            Self::GetSelfInfo => "contacts/getselfinfo",
            Self::GetSuggestedEntities => "contacts/getsuggestedentities",
            Self::QueryPresence => "presence/querypresence",
            Self::RemoveUser => "conversations/removeuser",
            Self::RenameConversation => "conversations/renameconversation",
            Self::SearchEntities => "conversations/searchentities",
            Self::SendChatMessage => "conversations/sendchatmessage",
            Self::SetActiveClient => "clients/setactiveclient",
            Self::SetConversationNotificationLevel => {
                "conversations/setconversationnotificationlevel"
            }
            Self::SetFocus => "conversations/setfocus",
            Self::SetPresence => "presence/setpresence",
            Self::SetTyping => "conversations/settyping",
            Self::SyncAllNewEvents => "conversations/syncallnewevents",
            Self::SyncRecentConversations => "conversations/syncrecentconversations",
            Self::UpdateWatermark => "conversations/updatewatermark",
        }
    }

    /// Schema name of the reply message.
    pub fn response_message(self) -> &'static str {
        match self {
            Self::AddUser => "AddUserResponse",
            Self::CreateConversation => "CreateConversationResponse",
            Self::DeleteConversation => "DeleteConversationResponse",
            Self::EasterEgg => "EasterEggResponse",
            Self::GetConversation => "GetConversationResponse",
            Self::GetEntityById => "GetEntityByIdResponse",
            Self::GetSelfInfo => "GetSelfInfoResponse",
            Self::GetSuggestedEntities => "GetSuggestedEntitiesResponse",
            Self::QueryPresence => "QueryPresenceResponse",
            Self::RemoveUser => "RemoveUserResponse",
            Self::RenameConversation => "RenameConversationResponse",
            Self::SearchEntities => "SearchEntitiesResponse",
            Self::SendChatMessage => "SendChatMessageResponse",
            Self::SetActiveClient => "SetActiveClientResponse",
            Self::SetConversationNotificationLevel => "SetConversationNotificationLevelResponse",
            Self::SetFocus => "SetFocusResponse",
            Self::SetPresence => "SetPresenceResponse",
            Self::SetTyping => "SetTypingResponse",
            Self::SyncAllNewEvents => "SyncAllNewEventsResponse",
            Self::SyncRecentConversations => "SyncRecentConversationsResponse",
            Self::UpdateWatermark => "UpdateWatermarkResponse",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A body ready to send, and where to send it.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub endpoint: Endpoint,
    pub body: Json,
}

// ---------------------------------------------------------------------------
// Chat message content
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Formatting {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub underline: bool,
}

/// One run of chat message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentType,
    pub text: String,
    pub formatting: Formatting,
    pub link_target: Option<String>,
}

impl Segment {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: SegmentType::Text,
            text: text.into(),
            formatting: Formatting::default(),
            link_target: None,
        }
    }

    pub fn line_break() -> Self {
        Self {
            kind: SegmentType::LineBreak,
            text: "\n".to_string(),
            formatting: Formatting::default(),
            link_target: None,
        }
    }

    pub fn link(text: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            kind: SegmentType::Link,
            text: text.into(),
            formatting: Formatting::default(),
            link_target: Some(target.into()),
        }
    }

    pub fn with_formatting(mut self, formatting: Formatting) -> Self {
        self.formatting = formatting;
        self
    }

    /// `[type, text, [bold, italic, strikethrough, underline], [link] | null]`
    pub fn to_lite(&self) -> Json {
        let f = &self.formatting;
        json!([
            self.kind.wire(),
            self.text,
            [f.bold, f.italic, f.strikethrough, f.underline],
            self.link_target.as_ref().map(|target| json!([target])),
        ])
    }
}

/// An image previously uploaded with
/// [`Client::upload_image`](crate::Client::upload_image).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageAttachment {
    /// Uploaded by this account.
    Own { image_id: String },
    /// Owned by another user.
    FromUser { image_id: String, user_id: String },
}

impl ImageAttachment {
    fn to_lite(&self) -> Json {
        match self {
            Self::Own { image_id } => json!([[image_id, false, null, false]]),
            Self::FromUser { image_id, user_id } => json!([[image_id, false, user_id, true]]),
        }
    }
}

/// A chat message to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub segments: Vec<Segment>,
    pub image: Option<ImageAttachment>,
    pub otr_status: OffTheRecordStatus,
    pub delivery_medium: DeliveryMediumType,
}

impl OutgoingMessage {
    /// An on-the-record message delivered over the default medium.
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            segments,
            image: None,
            otr_status: OffTheRecordStatus::OnTheRecord,
            delivery_medium: DeliveryMediumType::Babel,
        }
    }

    /// A single plain-text segment.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![Segment::text(text)])
    }

    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.image = Some(image);
        self
    }

    pub fn off_the_record(mut self) -> Self {
        self.otr_status = OffTheRecordStatus::OffTheRecord;
        self
    }
}

// ---------------------------------------------------------------------------
// RequestBuilder
// ---------------------------------------------------------------------------

/// Builds request bodies for one client identity.
///
/// Cheap to create; the engine makes a fresh one per call so the header
/// always carries the current client id.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    header: Json,
    presence_timeout_secs: u32,
    focus_timeout_secs: u32,
    max_response_size_bytes: u64,
}

fn invitees(chat_ids: &[String]) -> Json {
    chat_ids
        .iter()
        .map(|id| json!([id, null, null, "unknown", null, []]))
        .collect()
}

impl RequestBuilder {
    pub fn new(config: &ClientConfig, client_id: Option<&str>) -> Self {
        Self {
            header: json!([
                [null, null, config.client_name, null, null, null],
                [client_id, null],
                null,
                config.language,
            ]),
            presence_timeout_secs: config.presence_timeout_secs,
            focus_timeout_secs: config.focus_timeout_secs,
            max_response_size_bytes: config.max_response_size_bytes,
        }
    }

    pub fn header(&self) -> &Json {
        &self.header
    }

    fn request(&self, endpoint: Endpoint, rest: Vec<Json>) -> Request {
        let mut body = Vec::with_capacity(rest.len() + 1);
        body.push(self.header.clone());
        body.extend(rest);
        Request {
            endpoint,
            body: Json::Array(body),
        }
    }

    pub fn add_user(&self, conversation_id: &str, chat_ids: &[String], cgid: u32) -> Request {
        self.request(
            Endpoint::AddUser,
            vec![
                Json::Null,
                invitees(chat_ids),
                Json::Null,
                json!([[conversation_id], cgid, 2, null, 4]),
            ],
        )
    }

    /// One-to-one when there is a single invitee, unless `force_group`.
    pub fn create_conversation(&self, chat_ids: &[String], force_group: bool, cgid: u32) -> Request {
        let kind = if chat_ids.len() == 1 && !force_group { 1 } else { 2 };
        self.request(
            Endpoint::CreateConversation,
            vec![json!(kind), json!(cgid), Json::Null, invitees(chat_ids)],
        )
    }

    pub fn delete_conversation(&self, conversation_id: &str, now_usec: u64) -> Request {
        self.request(
            Endpoint::DeleteConversation,
            vec![json!([conversation_id]), json!(now_usec), Json::Null, json!([])],
        )
    }

    pub fn easter_egg(&self, conversation_id: &str, egg: &str) -> Request {
        self.request(
            Endpoint::EasterEgg,
            vec![json!([conversation_id]), json!([egg, null, 1])],
        )
    }

    /// Events before `event_timestamp_usec`, oldest first.
    pub fn get_conversation(
        &self,
        conversation_id: &str,
        event_timestamp_usec: u64,
        max_events: u32,
    ) -> Request {
        self.request(
            Endpoint::GetConversation,
            vec![
                json!([[conversation_id], [], []]),
                json!(false),
                json!(true),
                Json::Null,
                json!(max_events),
                json!([null, null, event_timestamp_usec]),
            ],
        )
    }

    pub fn get_entities_by_id(&self, chat_ids: &[String]) -> Request {
        let ids: Vec<Json> = chat_ids.iter().map(|id| json!([id])).collect();
        self.request(Endpoint::GetEntityById, vec![Json::Null, Json::Array(ids)])
    }

    pub fn get_self_info(&self) -> Request {
        self.request(Endpoint::GetSelfInfo, Vec::new())
    }

    pub fn get_suggested_entities(&self, max_count: u32) -> Request {
        self.request(
            Endpoint::GetSuggestedEntities,
            vec![Json::Null, Json::Null, json!(max_count)],
        )
    }

    /// Asks for every presence field (masks 1 through 10).
    pub fn query_presence(&self, chat_ids: &[String]) -> Request {
        let masks: Vec<u32> = (1..=10).collect();
        self.request(Endpoint::QueryPresence, vec![json!([chat_ids]), json!(masks)])
    }

    pub fn remove_user(&self, conversation_id: &str, cgid: u32) -> Request {
        self.request(
            Endpoint::RemoveUser,
            vec![
                Json::Null,
                Json::Null,
                Json::Null,
                json!([[conversation_id], cgid, 2]),
            ],
        )
    }

    pub fn rename_conversation(&self, conversation_id: &str, name: &str, cgid: u32) -> Request {
        self.request(
            Endpoint::RenameConversation,
            vec![
                Json::Null,
                json!(name),
                Json::Null,
                json!([[conversation_id], cgid, 1]),
            ],
        )
    }

    pub fn search_entities(&self, query: &str, max_results: u32) -> Request {
        self.request(
            Endpoint::SearchEntities,
            vec![json!([]), json!(query), json!(max_results)],
        )
    }

    pub fn send_chat_message(
        &self,
        conversation_id: &str,
        message: &OutgoingMessage,
        cgid: u32,
    ) -> Request {
        let segments: Vec<Json> = message.segments.iter().map(Segment::to_lite).collect();
        let media = message
            .image
            .as_ref()
            .map_or(Json::Null, ImageAttachment::to_lite);

        self.request(
            Endpoint::SendChatMessage,
            vec![
                Json::Null,
                Json::Null,
                Json::Null,
                json!([]),
                json!([segments, []]),
                media,
                json!([
                    [conversation_id],
                    cgid,
                    message.otr_status.wire(),
                    [message.delivery_medium.wire()],
                    null
                ]),
            ],
        )
    }

    /// `identity` is `email/client_id`.
    pub fn set_active_client(&self, is_active: bool, identity: &str, timeout_secs: u32) -> Request {
        self.request(
            Endpoint::SetActiveClient,
            vec![json!(is_active), json!(identity), json!(timeout_secs)],
        )
    }

    pub fn set_notification_level(&self, conversation_id: &str, level: NotificationLevel) -> Request {
        self.request(
            Endpoint::SetConversationNotificationLevel,
            vec![json!([conversation_id]), json!(level.wire())],
        )
    }

    pub fn set_focus(&self, conversation_id: &str, focus: FocusType) -> Request {
        self.request(
            Endpoint::SetFocus,
            vec![
                json!([conversation_id]),
                json!(focus.wire()),
                json!(self.focus_timeout_secs),
            ],
        )
    }

    /// Online maps to presence state 1, offline to 40 (desktop active).
    pub fn set_presence(&self, online: bool, mood: Option<&str>) -> Request {
        let state = if online { 1 } else { 40 };
        self.request(
            Endpoint::SetPresence,
            vec![
                json!([self.presence_timeout_secs, state]),
                Json::Null,
                Json::Null,
                json!([!online]),
                json!([mood]),
            ],
        )
    }

    pub fn set_typing(&self, conversation_id: &str, typing: TypingType) -> Request {
        self.request(
            Endpoint::SetTyping,
            vec![json!([conversation_id]), json!(typing.wire())],
        )
    }

    pub fn sync_all_new_events(&self, since_usec: u64) -> Request {
        self.request(
            Endpoint::SyncAllNewEvents,
            vec![
                json!(since_usec),
                json!([]),
                Json::Null,
                json!([]),
                json!(false),
                json!([]),
                json!(self.max_response_size_bytes),
            ],
        )
    }

    pub fn sync_recent_conversations(&self, max_conversations: u32, max_events_per: u32) -> Request {
        self.request(
            Endpoint::SyncRecentConversations,
            vec![
                Json::Null,
                json!(max_conversations),
                json!(max_events_per),
                json!([1]),
            ],
        )
    }

    pub fn update_watermark(&self, conversation_id: &str, read_timestamp_usec: u64) -> Request {
        self.request(
            Endpoint::UpdateWatermark,
            vec![json!([conversation_id]), json!(read_timestamp_usec)],
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use parrot_protocol::service_schema;

    use super::*;

    fn builder() -> RequestBuilder {
        RequestBuilder::new(&ClientConfig::default(), Some("cid"))
    }

    fn hdr() -> Json {
        json!([[null, null, "parrot", null, null, null], ["cid", null], null, "en"])
    }

    #[test]
    fn test_header_without_client_id_is_null() {
        let b = RequestBuilder::new(&ClientConfig::default(), None);
        assert_eq!(
            b.header(),
            &json!([[null, null, "parrot", null, null, null], [null, null], null, "en"])
        );
    }

    #[test]
    fn test_endpoints_have_unique_paths_and_known_responses() {
        let schema = service_schema();
        let paths: HashSet<&str> = Endpoint::ALL.iter().map(|e| e.path()).collect();
        assert_eq!(paths.len(), Endpoint::ALL.len());
        for endpoint in Endpoint::ALL {
            let desc = schema
                .message(endpoint.response_message())
                .unwrap_or_else(|| panic!("{endpoint} has no response message"));
            assert_eq!(desc.field(1).map(|f| f.name.as_str()), Some("response_header"));
        }
    }

    #[test]
    fn test_add_user_body() {
        let req = builder().add_user("conv", &["a".to_string(), "b".to_string()], 7);
        assert_eq!(req.endpoint.path(), "conversations/adduser");
        assert_eq!(
            req.body,
            json!([
                hdr(),
                null,
                [["a", null, null, "unknown", null, []], ["b", null, null, "unknown", null, []]],
                null,
                [["conv"], 7, 2, null, 4]
            ])
        );
    }

    #[test]
    fn test_create_conversation_kind_follows_invitees() {
        let one = vec!["a".to_string()];
        let two = vec!["a".to_string(), "b".to_string()];
        assert_eq!(builder().create_conversation(&one, false, 1).body[1], json!(1));
        assert_eq!(builder().create_conversation(&one, true, 1).body[1], json!(2));
        assert_eq!(builder().create_conversation(&two, false, 1).body[1], json!(2));
        assert_eq!(builder().create_conversation(&one, false, 9).body[2], json!(9));
    }

    #[test]
    fn test_get_conversation_body() {
        let req = builder().get_conversation("conv", 1_500, 50);
        assert_eq!(
            req.body,
            json!([hdr(), [["conv"], [], []], false, true, null, 50, [null, null, 1_500]])
        );
    }

    #[test]
    fn test_query_presence_masks() {
        let req = builder().query_presence(&["x".to_string()]);
        assert_eq!(req.body, json!([hdr(), [["x"]], [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]]));
    }

    #[test]
    fn test_send_chat_message_with_own_image() {
        let message = OutgoingMessage::new(vec![
            Segment::text("hi").with_formatting(Formatting {
                bold: true,
                ..Formatting::default()
            }),
            Segment::link("docs", "https://example.com"),
        ])
        .with_image(ImageAttachment::Own {
            image_id: "img".into(),
        });
        let req = builder().send_chat_message("conv", &message, 42);

        assert_eq!(
            req.body,
            json!([
                hdr(),
                null,
                null,
                null,
                [],
                [
                    [
                        [0, "hi", [true, false, false, false], null],
                        [2, "docs", [false, false, false, false], ["https://example.com"]]
                    ],
                    []
                ],
                [["img", false, null, false]],
                [["conv"], 42, 2, [1], null]
            ])
        );
    }

    #[test]
    fn test_send_chat_message_media_variants() {
        let plain = builder().send_chat_message("c", &OutgoingMessage::text("x"), 1);
        assert_eq!(plain.body[6], Json::Null);

        let shared = OutgoingMessage::text("x")
            .off_the_record()
            .with_image(ImageAttachment::FromUser {
                image_id: "img".into(),
                user_id: "u".into(),
            });
        let req = builder().send_chat_message("c", &shared, 1);
        assert_eq!(req.body[6], json!([["img", false, "u", true]]));
        assert_eq!(req.body[7][2], json!(1));
    }

    #[test]
    fn test_set_presence_online_and_offline() {
        assert_eq!(
            builder().set_presence(true, None).body,
            json!([hdr(), [720, 1], null, null, [false], [null]])
        );
        assert_eq!(
            builder().set_presence(false, Some("😀")).body,
            json!([hdr(), [720, 40], null, null, [true], ["😀"]])
        );
    }

    #[test]
    fn test_small_bodies() {
        let b = builder();
        assert_eq!(b.get_self_info().body, json!([hdr()]));
        assert_eq!(
            b.set_focus("c", FocusType::Unfocused).body,
            json!([hdr(), ["c"], 2, 20])
        );
        assert_eq!(
            b.set_typing("c", TypingType::Paused).body,
            json!([hdr(), ["c"], 2])
        );
        assert_eq!(
            b.set_notification_level("c", NotificationLevel::Quiet).body,
            json!([hdr(), ["c"], 10])
        );
        assert_eq!(
            b.set_active_client(true, "me@example.com/cid", 120).body,
            json!([hdr(), true, "me@example.com/cid", 120])
        );
        assert_eq!(
            b.sync_all_new_events(5).body,
            json!([hdr(), 5, [], null, [], false, [], 1_048_576])
        );
        assert_eq!(
            b.sync_recent_conversations(100, 1).body,
            json!([hdr(), null, 100, 1, [1]])
        );
        assert_eq!(b.update_watermark("c", 9).body, json!([hdr(), ["c"], 9]));
        assert_eq!(
            b.remove_user("c", 3).body,
            json!([hdr(), null, null, null, [["c"], 3, 2]])
        );
        assert_eq!(
            b.rename_conversation("c", "n", 3).body,
            json!([hdr(), null, "n", null, [["c"], 3, 1]])
        );
        assert_eq!(
            b.search_entities("bob", 10).body,
            json!([hdr(), [], "bob", 10])
        );
        assert_eq!(
            b.get_suggested_entities(5).body,
            json!([hdr(), null, null, 5])
        );
        assert_eq!(
            b.easter_egg("c", "ponies").body,
            json!([hdr(), ["c"], ["ponies", null, 1]])
        );
        assert_eq!(
            b.delete_conversation("c", 77).body,
            json!([hdr(), ["c"], 77, null, []])
        );
        assert_eq!(
            b.get_entities_by_id(&["a".to_string()]).body,
            json!([hdr(), null, [["a"]]])
        );
    }
}
