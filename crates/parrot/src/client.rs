//! The client engine.
//!
//! [`Client`] owns the session state and is the only thing that talks to
//! the [`Transport`]. It is cheap to clone; clones share one engine.
//!
//! Requests go out as hand-built bodies (see [`requests`](crate::requests))
//! and replies come back through the lite codec as generic messages or
//! typed records. Pushed data arrives on a listener task started by
//! [`connect`](Client::connect) and is handed to subscribers as
//! [`ClientEvent`]s.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use parrot_protocol::{
    FocusType, LiteCodec, LiteRecord, NotificationLevel, SelfInfo, TypingType,
};
use parrot_schema::Message;
use parrot_session::{Activation, ClientActivity, Clock, SessionState, SystemClock};
use parrot_transport::{Transport, TransportEvent};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

use crate::outbox::{OutboxHandle, OutboxJob, SendReceipt};
use crate::push::{self, ClientEvent};
use crate::requests::{self, OutgoingMessage, Request, RequestBuilder};
use crate::{ClientConfig, ClientError};

/// State shared by the client, its listener task and its outboxes.
pub(crate) struct ClientInner<T: Transport> {
    pub(crate) transport: Arc<T>,
    pub(crate) config: ClientConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) session: tokio::sync::Mutex<SessionState>,
    events: broadcast::Sender<ClientEvent>,
    outboxes: Mutex<HashMap<String, OutboxHandle>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Transport> ClientInner<T> {
    pub(crate) fn publish(&self, event: ClientEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// A request builder carrying the current client id.
    pub(crate) async fn builder(&self) -> RequestBuilder {
        let session = self.session.lock().await;
        RequestBuilder::new(&self.config, session.client_id())
    }

    /// Sends a request and decodes its reply.
    pub(crate) async fn send(&self, request: &Request) -> Result<Message, ClientError> {
        let endpoint = request.endpoint;
        tracing::debug!(endpoint = endpoint.path(), "sending request");
        tracing::trace!(endpoint = endpoint.path(), body = %request.body, "request body");

        let reply = self
            .transport
            .request(endpoint.path(), &request.body, false)
            .await?;
        let message = LiteCodec::service().decode_response(endpoint.response_message(), &reply)?;
        Ok(message)
    }
}

impl<T: Transport> Drop for ClientInner<T> {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.listener).take() {
            handle.abort();
        }
    }
}

/// A connection to the chat service.
pub struct Client<T: Transport> {
    pub(crate) inner: Arc<ClientInner<T>>,
}

impl<T: Transport> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> Client<T> {
    /// Creates a client on the system clock. Nothing is sent until
    /// [`connect`](Self::connect).
    pub fn new(transport: Arc<T>, config: ClientConfig) -> Self {
        Self::with_clock(transport, config, Arc::new(SystemClock))
    }

    /// Creates a client that reads time from `clock`.
    pub fn with_clock(transport: Arc<T>, config: ClientConfig, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(ClientInner {
                transport,
                config,
                clock,
                session: tokio::sync::Mutex::new(SessionState::new()),
                events,
                outboxes: Mutex::new(HashMap::new()),
                listener: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Receives every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    pub async fn client_id(&self) -> Option<String> {
        self.inner.session.lock().await.client_id().map(str::to_string)
    }

    pub async fn email(&self) -> Option<String> {
        self.inner.session.lock().await.email().map(str::to_string)
    }

    pub async fn activity(&self) -> ClientActivity {
        self.inner.session.lock().await.activity()
    }

    // -- Lifecycle -----------------------------------------------------------

    /// Starts listening on the push channel with a fresh session.
    ///
    /// Connectivity changes are republished as [`ClientEvent`]s and pushed
    /// arrays are demultiplexed on a background task. Connecting again
    /// replaces the previous listener.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.inner.session.lock().await.reset();
        let mut events = self.inner.transport.listen().await?;

        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                match event {
                    TransportEvent::Connected => {
                        tracing::info!("channel connected");
                        inner.publish(ClientEvent::Connected);
                    }
                    TransportEvent::Reconnected => {
                        tracing::info!("channel reconnected");
                        inner.publish(ClientEvent::Reconnected);
                    }
                    TransportEvent::Disconnected => {
                        tracing::info!("channel disconnected");
                        inner.publish(ClientEvent::Disconnected);
                    }
                    TransportEvent::MessageReceived(raw) => {
                        push::handle_message(&inner, &raw).await;
                    }
                }
            }
            tracing::debug!("push listener stopped");
        });

        if let Some(previous) = lock(&self.inner.listener).replace(handle) {
            previous.abort();
        }
        tracing::info!("client listening");
        Ok(())
    }

    /// Stops the push listener and lets the outboxes drain.
    pub fn disconnect(&self) {
        if let Some(handle) = lock(&self.inner.listener).take() {
            handle.abort();
        }
        lock(&self.inner.outboxes).clear();
        tracing::info!("client disconnected");
    }

    // -- Active client -------------------------------------------------------

    /// Claims the active-client role if this client doesn't hold it or the
    /// last claim is older than the configured limit.
    ///
    /// Meant to be called whenever the user interacts; most calls send
    /// nothing. The state is committed before any request goes out, so
    /// overlapping calls announce at most once. The first announcement
    /// looks up the account email; the announcement goes out even if that
    /// lookup fails.
    ///
    /// Returns whether an announcement was sent.
    pub async fn set_active(&self) -> Result<bool, ClientError> {
        let activation = {
            let mut session = self.inner.session.lock().await;
            session.begin_activation(
                self.inner.clock.now_epoch_secs(),
                self.inner.config.session.set_active_limit,
            )
        };

        let (client_id, email) = match activation {
            Activation::NoClientId => {
                tracing::warn!("cannot set active client until a client id is received");
                return Ok(false);
            }
            Activation::Throttled => return Ok(false),
            Activation::Announce { client_id, email } => (client_id, email),
        };

        if email.is_none() {
            self.resolve_email().await;
        }

        tracing::info!(%client_id, "announcing active client");
        self.set_active_client(true, self.inner.config.session.active_timeout_secs)
            .await?;
        Ok(true)
    }

    async fn resolve_email(&self) {
        match self.get_self_info().await {
            Ok(info) => match info.email() {
                Some(email) => self.inner.session.lock().await.resolve_email(email),
                None => tracing::warn!("self info has no email"),
            },
            Err(e) => tracing::warn!(error = %e, "self info lookup failed"),
        }
    }

    // -- Endpoints -----------------------------------------------------------

    async fn call(
        &self,
        build: impl FnOnce(&RequestBuilder) -> Request,
    ) -> Result<Message, ClientError> {
        let request = build(&self.inner.builder().await);
        self.inner.send(&request).await
    }

    /// Invites users to an existing conversation.
    pub async fn add_user(
        &self,
        conversation_id: &str,
        chat_ids: &[String],
    ) -> Result<Message, ClientError> {
        let cgid = requests::client_generated_id();
        self.call(|b| b.add_user(conversation_id, chat_ids, cgid)).await
    }

    /// Creates a conversation with the given users (not counting this
    /// account).
    pub async fn create_conversation(
        &self,
        chat_ids: &[String],
        force_group: bool,
    ) -> Result<Message, ClientError> {
        let cgid = requests::client_generated_id();
        self.call(|b| b.create_conversation(chat_ids, force_group, cgid))
            .await
    }

    /// Deletes a one-to-one conversation.
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<Message, ClientError> {
        let now = self.inner.clock.now_micros();
        self.call(|b| b.delete_conversation(conversation_id, now)).await
    }

    pub async fn send_easter_egg(
        &self,
        conversation_id: &str,
        egg: &str,
    ) -> Result<Message, ClientError> {
        self.call(|b| b.easter_egg(conversation_id, egg)).await
    }

    /// Events before `event_timestamp_usec`, oldest first. Used for
    /// scrollback.
    pub async fn get_conversation(
        &self,
        conversation_id: &str,
        event_timestamp_usec: u64,
        max_events: u32,
    ) -> Result<Message, ClientError> {
        self.call(|b| b.get_conversation(conversation_id, event_timestamp_usec, max_events))
            .await
    }

    /// Looks up users by chat id. An empty list sends nothing and returns
    /// `None`.
    pub async fn get_entities_by_id(
        &self,
        chat_ids: &[String],
    ) -> Result<Option<Message>, ClientError> {
        if chat_ids.is_empty() {
            return Ok(None);
        }
        self.call(|b| b.get_entities_by_id(chat_ids)).await.map(Some)
    }

    pub async fn get_self_info(&self) -> Result<SelfInfo, ClientError> {
        let message = self.call(RequestBuilder::get_self_info).await?;
        Ok(SelfInfo::from_message(&message)?)
    }

    pub async fn get_suggested_entities(&self, max_count: u32) -> Result<Message, ClientError> {
        self.call(|b| b.get_suggested_entities(max_count)).await
    }

    /// Presence of the given users. An empty list is refused without a
    /// request.
    pub async fn query_presence(&self, chat_ids: &[String]) -> Result<Message, ClientError> {
        if chat_ids.is_empty() {
            tracing::warn!("cannot query presence for zero chat ids");
            return Err(ClientError::InvalidRequest(
                "query_presence needs at least one chat id".into(),
            ));
        }
        self.call(|b| b.query_presence(chat_ids)).await
    }

    /// Leaves a group conversation.
    pub async fn remove_user(&self, conversation_id: &str) -> Result<Message, ClientError> {
        let cgid = requests::client_generated_id();
        self.call(|b| b.remove_user(conversation_id, cgid)).await
    }

    pub async fn rename_conversation(
        &self,
        conversation_id: &str,
        name: &str,
    ) -> Result<Message, ClientError> {
        let cgid = requests::client_generated_id();
        self.call(|b| b.rename_conversation(conversation_id, name, cgid))
            .await
    }

    pub async fn search_entities(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Message, ClientError> {
        self.call(|b| b.search_entities(query, max_results)).await
    }

    /// Queues a chat message on the conversation's outbox.
    ///
    /// The message is queued when this is called, not when the receipt is
    /// polled, so messages to one conversation reach the server in call
    /// order. Must be called from within a Tokio runtime.
    pub fn send_chat_message(&self, conversation_id: &str, message: OutgoingMessage) -> SendReceipt {
        let (reply, receipt) = oneshot::channel();
        let job = OutboxJob {
            message,
            cgid: requests::client_generated_id(),
            reply,
        };

        let mut outboxes = lock(&self.inner.outboxes);
        let handle = outboxes
            .entry(conversation_id.to_string())
            .or_insert_with(|| OutboxHandle::spawn(conversation_id, Arc::downgrade(&self.inner)));

        if let Err(job) = handle.enqueue(job) {
            // The actor is gone (its task was cancelled); start a new one.
            tracing::debug!(%conversation_id, "restarting outbox");
            *handle = OutboxHandle::spawn(conversation_id, Arc::downgrade(&self.inner));
            if handle.enqueue(job).is_err() {
                tracing::warn!(%conversation_id, "outbox closed immediately");
            }
        }
        outboxes.retain(|_, h| !h.is_closed());

        SendReceipt::new(conversation_id, receipt)
    }

    /// Tells the server whether this client is the active one, naming it
    /// as `email/client_id`.
    pub async fn set_active_client(
        &self,
        is_active: bool,
        timeout_secs: u32,
    ) -> Result<Message, ClientError> {
        let identity = self
            .inner
            .session
            .lock()
            .await
            .identity()
            .ok_or(parrot_session::SessionError::NoClientId)?;
        self.call(|b| b.set_active_client(is_active, &identity, timeout_secs))
            .await
    }

    pub async fn set_notification_level(
        &self,
        conversation_id: &str,
        level: NotificationLevel,
    ) -> Result<Message, ClientError> {
        self.call(|b| b.set_notification_level(conversation_id, level))
            .await
    }

    pub async fn set_focus(
        &self,
        conversation_id: &str,
        focus: FocusType,
    ) -> Result<Message, ClientError> {
        self.call(|b| b.set_focus(conversation_id, focus)).await
    }

    pub async fn set_presence(
        &self,
        online: bool,
        mood: Option<&str>,
    ) -> Result<Message, ClientError> {
        self.call(|b| b.set_presence(online, mood)).await
    }

    pub async fn set_typing(
        &self,
        conversation_id: &str,
        typing: TypingType,
    ) -> Result<Message, ClientError> {
        self.call(|b| b.set_typing(conversation_id, typing)).await
    }

    /// Every event at or after `since_usec`.
    pub async fn sync_all_new_events(&self, since_usec: u64) -> Result<Message, ClientError> {
        self.call(|b| b.sync_all_new_events(since_usec)).await
    }

    pub async fn sync_recent_conversations(
        &self,
        max_conversations: u32,
        max_events_per: u32,
    ) -> Result<Message, ClientError> {
        self.call(|b| b.sync_recent_conversations(max_conversations, max_events_per))
            .await
    }

    /// Marks a conversation read up to `read_timestamp_usec`.
    pub async fn update_watermark(
        &self,
        conversation_id: &str,
        read_timestamp_usec: u64,
    ) -> Result<Message, ClientError> {
        self.call(|b| b.update_watermark(conversation_id, read_timestamp_usec))
            .await
    }
}

#[cfg(test)]
mod tests {
    use parrot_transport::MemoryTransport;

    use super::*;

    fn client() -> (Client<MemoryTransport>, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let client = Client::new(Arc::clone(&transport), ClientConfig::default());
        (client, transport)
    }

    #[tokio::test]
    async fn test_get_entities_by_id_empty_sends_nothing() {
        let (client, transport) = client();
        assert!(client.get_entities_by_id(&[]).await.unwrap().is_none());
        assert!(transport.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_query_presence_empty_is_refused() {
        let (client, transport) = client();
        let err = client.query_presence(&[]).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
        assert!(transport.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_set_active_without_client_id_is_noop() {
        let (client, transport) = client();
        assert!(!client.set_active().await.unwrap());
        assert!(transport.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_set_active_client_requires_client_id() {
        let (client, _transport) = client();
        let err = client.set_active_client(true, 120).await.unwrap_err();
        assert!(matches!(err, ClientError::Session(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let (client, transport) = client();
        transport.fail("conversations/settyping", "503");
        let err = client
            .set_typing("conv-1", TypingType::Started)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }

    #[tokio::test]
    async fn test_reply_is_decoded_as_endpoint_response() {
        let (client, transport) = client();
        transport.reply("conversations/settyping", r#"["cstrp", [1], "1500000000000000"]"#);
        let reply = client.set_typing("conv-1", TypingType::Started).await.unwrap();
        assert_eq!(reply.name(), "SetTypingResponse");
        assert_eq!(reply.get_u64("timestamp"), Some(1_500_000_000_000_000));
    }

    #[tokio::test]
    async fn test_undecodable_reply_is_protocol_error() {
        let (client, transport) = client();
        transport.reply("presence/setpresence", "<html>");
        let err = client.set_presence(true, None).await.unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }
}
