//! Push demultiplexing.
//!
//! Every raw array the transport delivers runs through [`handle_message`]
//! on the listener task:
//!
//! ```text
//! ["noop"]                      keep-alive, dropped
//! [{"p": "<envelope json>"}]    decode_envelope
//!     ├── client id (tag 3)  → session, then subscribe services once per id
//!     └── batch (tag 2)      → per StateUpdate, in order:
//!                                apply active-client state, publish event
//! ```
//!
//! Nothing here is fatal. Malformed envelopes are logged and dropped; a
//! malformed tag only loses itself, so a client id next to a bad batch is
//! still applied.

use parrot_protocol::{LiteCodec, PushEvent, StateUpdate, decode_envelope};
use parrot_transport::{ChannelMap, Transport};
use serde_json::{Value as Json, json};

use crate::client::ClientInner;

/// Something subscribers of [`Client::subscribe`](crate::Client::subscribe)
/// are told about.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected,
    Reconnected,
    Disconnected,
    /// One entry of a pushed batch, in server order.
    StateUpdate(StateUpdate),
}

/// What one pushed array turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PushOutcome {
    KeepAlive,
    Handled {
        new_client_id: bool,
        state_updates: usize,
    },
    Dropped(String),
}

/// The control map that subscribes the channel to `service`, sent once
/// per newly assigned client id.
pub(crate) fn add_services_map(service: &str) -> ChannelMap {
    let inner = json!({ "3": { "1": { "1": service } } });
    ChannelMap::from([("p".to_string(), inner.to_string())])
}

pub(crate) async fn handle_message<T: Transport>(inner: &ClientInner<T>, raw: &[Json]) -> PushOutcome {
    let Some(first) = raw.first() else {
        tracing::warn!("dropping empty push array");
        return PushOutcome::Dropped("empty push array".into());
    };
    if first.as_str() == Some("noop") {
        tracing::trace!("keep-alive");
        return PushOutcome::KeepAlive;
    }
    tracing::trace!(%first, "push received");

    let envelope = match decode_envelope(&LiteCodec::service(), first) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "dropping malformed push");
            return PushOutcome::Dropped(e.to_string());
        }
    };
    for rejected in &envelope.rejected {
        tracing::warn!(tag = rejected.tag, reason = %rejected.reason, "dropping malformed envelope tag");
    }
    if envelope.is_rejected() {
        let reasons: Vec<&str> = envelope.rejected.iter().map(|r| r.reason.as_str()).collect();
        return PushOutcome::Dropped(reasons.join("; "));
    }

    let mut new_client_id = false;
    if let Some(client_id) = envelope.client_id.as_deref() {
        new_client_id = inner.session.lock().await.observe_client_id(client_id);
        if new_client_id {
            add_channel_services(inner).await;
        }
    }

    let state_updates = match envelope.push {
        None => 0,
        Some(PushEvent::Ignored(reason)) => {
            tracing::debug!(%reason, "ignoring push payload");
            0
        }
        Some(PushEvent::StateUpdateBatch(updates)) => {
            let count = updates.len();
            let mut session = inner.session.lock().await;
            for update in updates {
                if let Some(state) = update.active_client_state() {
                    session.apply_remote_activity(state);
                }
                inner.publish(ClientEvent::StateUpdate(update));
            }
            tracing::debug!(count, "state updates delivered");
            count
        }
    };

    PushOutcome::Handled {
        new_client_id,
        state_updates,
    }
}

async fn add_channel_services<T: Transport>(inner: &ClientInner<T>) {
    let maps = vec![add_services_map(&inner.config.service_name)];
    match inner.transport.send_maps(maps).await {
        Ok(()) => tracing::debug!(service = %inner.config.service_name, "channel services added"),
        Err(e) => tracing::warn!(error = %e, "failed to add channel services"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parrot_protocol::ActiveClientState;
    use parrot_session::ClientActivity;
    use parrot_transport::MemoryTransport;

    use super::*;
    use crate::{Client, ClientConfig};

    fn client() -> (Client<MemoryTransport>, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let client = Client::new(Arc::clone(&transport), ClientConfig::default());
        (client, transport)
    }

    fn wrapped(inner: Json) -> Json {
        json!({ "p": inner.to_string() })
    }

    fn batch(states: &[i32]) -> Json {
        let updates: Vec<Json> = states.iter().map(|s| json!([[s]])).collect();
        json!({ "2": { "2": json!(["cbu", updates]).to_string() } })
    }

    #[test]
    fn test_add_services_map_shape() {
        let map = add_services_map("babel");
        assert_eq!(map.len(), 1);
        assert_eq!(map["p"], r#"{"3":{"1":{"1":"babel"}}}"#);
    }

    #[tokio::test]
    async fn test_handle_message_noop_is_keep_alive() {
        let (client, transport) = client();
        let outcome = handle_message(&client.inner, &[json!("noop")]).await;
        assert_eq!(outcome, PushOutcome::KeepAlive);
        assert!(transport.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_handle_message_client_id_subscribes_once() {
        let (client, transport) = client();
        let envelope = [wrapped(json!({ "3": { "2": "abc123" } }))];

        let first = handle_message(&client.inner, &envelope).await;
        let second = handle_message(&client.inner, &envelope).await;

        assert_eq!(
            first,
            PushOutcome::Handled {
                new_client_id: true,
                state_updates: 0
            }
        );
        assert_eq!(
            second,
            PushOutcome::Handled {
                new_client_id: false,
                state_updates: 0
            }
        );
        assert_eq!(transport.sent_maps(), vec![vec![add_services_map("babel")]]);
        assert_eq!(client.client_id().await.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_handle_message_batch_applies_in_order() {
        let (client, _transport) = client();
        let mut events = client.subscribe();

        let outcome = handle_message(&client.inner, &[wrapped(batch(&[1, 2]))]).await;
        assert_eq!(
            outcome,
            PushOutcome::Handled {
                new_client_id: false,
                state_updates: 2
            }
        );
        assert_eq!(client.activity().await, ClientActivity::IsNotActive);

        let mut seen = Vec::new();
        for _ in 0..2 {
            match events.recv().await.unwrap() {
                ClientEvent::StateUpdate(update) => seen.push(update.active_client_state()),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(
            seen,
            vec![
                Some(ActiveClientState::IsActive),
                Some(ActiveClientState::OtherActive)
            ]
        );
    }

    #[tokio::test]
    async fn test_handle_message_bare_envelope_accepted() {
        let (client, _transport) = client();
        let outcome = handle_message(&client.inner, &[batch(&[1])]).await;
        assert!(matches!(
            outcome,
            PushOutcome::Handled { state_updates: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_handle_message_unknown_discriminator_ignored() {
        let (client, _transport) = client();
        let mut events = client.subscribe();
        let envelope = json!({ "2": { "2": json!(["bfo", []]).to_string() } });

        let outcome = handle_message(&client.inner, &[wrapped(envelope)]).await;
        assert_eq!(
            outcome,
            PushOutcome::Handled {
                new_client_id: false,
                state_updates: 0
            }
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_handle_message_bad_batch_still_applies_client_id() {
        let (client, transport) = client();
        let mut events = client.subscribe();
        let bad_batch = json!(["cbu", [[["not-an-int"]]]]).to_string();
        let envelope = json!({ "3": { "2": "abc123" }, "2": { "2": bad_batch } });

        let outcome = handle_message(&client.inner, &[wrapped(envelope)]).await;
        assert_eq!(
            outcome,
            PushOutcome::Handled {
                new_client_id: true,
                state_updates: 0
            }
        );
        assert_eq!(client.client_id().await.as_deref(), Some("abc123"));
        assert_eq!(transport.sent_maps(), vec![vec![add_services_map("babel")]]);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_handle_message_bad_client_id_still_delivers_batch() {
        let (client, transport) = client();
        let mut envelope = batch(&[1]);
        envelope["3"] = json!({ "1": 1 });

        let outcome = handle_message(&client.inner, &[wrapped(envelope)]).await;
        assert_eq!(
            outcome,
            PushOutcome::Handled {
                new_client_id: false,
                state_updates: 1
            }
        );
        assert_eq!(client.activity().await, ClientActivity::IsActive);
        assert!(transport.sent_maps().is_empty());
    }

    #[tokio::test]
    async fn test_handle_message_malformed_dropped() {
        let (client, transport) = client();
        let outcome = handle_message(&client.inner, &[json!({ "p": "not json" })]).await;
        assert!(matches!(outcome, PushOutcome::Dropped(_)));

        let outcome = handle_message(&client.inner, &[]).await;
        assert!(matches!(outcome, PushOutcome::Dropped(_)));

        let outcome = handle_message(&client.inner, &[json!({ "3": { "2": 5 } })]).await;
        assert!(matches!(outcome, PushOutcome::Dropped(_)));
        assert!(transport.recorded().is_empty());
    }
}
