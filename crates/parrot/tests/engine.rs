//! End-to-end engine behavior over the in-memory transport.

use std::sync::Arc;
use std::time::Duration;

use parrot::prelude::*;
use parrot_session::ManualClock;
use parrot_transport::{MemoryTransport, Recorded};
use serde_json::{Value as Json, json};

const START: u64 = 1_700_000_000;

fn setup() -> (Client<MemoryTransport>, Arc<MemoryTransport>, Arc<ManualClock>) {
    let transport = Arc::new(MemoryTransport::new());
    let clock = Arc::new(ManualClock::new(START));
    let client = Client::with_clock(
        Arc::clone(&transport),
        ClientConfig::default(),
        Arc::clone(&clock) as Arc<dyn parrot_session::Clock>,
    );
    (client, transport, clock)
}

fn wrapped(inner: Json) -> Json {
    json!({ "p": inner.to_string() })
}

/// Connects and pushes a client id, then waits for the service
/// subscription to go out.
async fn connected_with_id(client: &Client<MemoryTransport>, transport: &MemoryTransport, id: &str) {
    client.connect().await.unwrap();
    transport.push_message(vec![wrapped(json!({ "3": { "2": id } }))]);
    tokio::time::timeout(Duration::from_secs(1), transport.wait_for_traffic(1))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_connect_mirrors_transport_events() {
    let (client, transport, _clock) = setup();
    let mut events = client.subscribe();
    client.connect().await.unwrap();

    transport.push(TransportEvent::Connected);
    transport.push(TransportEvent::Disconnected);
    transport.push(TransportEvent::Reconnected);

    assert_eq!(events.recv().await.unwrap(), ClientEvent::Connected);
    assert_eq!(events.recv().await.unwrap(), ClientEvent::Disconnected);
    assert_eq!(events.recv().await.unwrap(), ClientEvent::Reconnected);
}

#[tokio::test]
async fn test_client_id_push_subscribes_exactly_once() {
    let (client, transport, _clock) = setup();
    let mut events = client.subscribe();
    connected_with_id(&client, &transport, "abc123").await;

    // Same id again, followed by a marker so we know both were processed.
    transport.push_message(vec![wrapped(json!({ "3": { "2": "abc123" } }))]);
    transport.push(TransportEvent::Connected);
    assert_eq!(events.recv().await.unwrap(), ClientEvent::Connected);

    assert_eq!(client.client_id().await.as_deref(), Some("abc123"));
    let maps = transport.sent_maps();
    assert_eq!(maps.len(), 1);
    assert_eq!(maps[0][0]["p"], r#"{"3":{"1":{"1":"babel"}}}"#);
}

#[tokio::test]
async fn test_client_id_survives_malformed_batch() {
    let (client, transport, _clock) = setup();
    client.connect().await.unwrap();

    let bad_batch = json!(["cbu", [[["not-an-int"]]]]).to_string();
    transport.push_message(vec![wrapped(json!({ "3": { "2": "abc123" }, "2": { "2": bad_batch } }))]);
    tokio::time::timeout(Duration::from_secs(1), transport.wait_for_traffic(1))
        .await
        .unwrap();

    assert_eq!(client.client_id().await.as_deref(), Some("abc123"));
    assert_eq!(transport.sent_maps().len(), 1);
}

#[tokio::test]
async fn test_keep_alive_and_garbage_are_dropped() {
    let (client, transport, _clock) = setup();
    let mut events = client.subscribe();
    client.connect().await.unwrap();

    transport.push_message(vec![json!("noop")]);
    transport.push_message(vec![json!(42)]);
    transport.push(TransportEvent::Connected);

    assert_eq!(events.recv().await.unwrap(), ClientEvent::Connected);
    assert!(transport.recorded().is_empty());
}

#[tokio::test]
async fn test_batch_last_active_state_wins_and_events_keep_order() {
    let (client, transport, _clock) = setup();
    let mut events = client.subscribe();
    client.connect().await.unwrap();

    let payload = json!(["cbu", [[[1, null, "first"]], [[2, null, "second"]]]]);
    transport.push_message(vec![wrapped(json!({ "2": { "2": payload.to_string() } }))]);

    let mut traces = Vec::new();
    for _ in 0..2 {
        let ClientEvent::StateUpdate(update) = events.recv().await.unwrap() else {
            panic!("expected a state update");
        };
        traces.push(update.header.and_then(|h| h.request_trace_id));
    }
    assert_eq!(traces, vec![Some("first".into()), Some("second".into())]);
    assert_eq!(client.activity().await, ClientActivity::IsNotActive);
}

#[tokio::test]
async fn test_set_active_rate_limited_with_email_lookup() {
    let (client, transport, clock) = setup();
    transport.reply(
        "contacts/getselfinfo",
        r#"["cgsirp", [1], [null, null, null, null, null, null, null, null, ["g", "c"], [1, "Me", null, null, ["me@example.com"]]]]"#,
    );
    connected_with_id(&client, &transport, "abc123").await;

    assert!(client.set_active().await.unwrap());
    clock.advance(Duration::from_millis(500));
    assert!(!client.set_active().await.unwrap());

    let announced = transport.requests_to("clients/setactiveclient");
    assert_eq!(announced.len(), 1);
    assert_eq!(announced[0][2], json!("me@example.com/abc123"));
    assert_eq!(announced[0][3], json!(120));
    assert_eq!(client.email().await.as_deref(), Some("me@example.com"));

    clock.advance(Duration::from_secs(60));
    assert!(client.set_active().await.unwrap());
    assert_eq!(transport.requests_to("clients/setactiveclient").len(), 2);
    // The email is only looked up once.
    assert_eq!(transport.requests_to("contacts/getselfinfo").len(), 1);
}

#[tokio::test]
async fn test_set_active_concurrent_calls_announce_once() {
    let (client, transport, _clock) = setup();
    transport.reply(
        "contacts/getselfinfo",
        r#"["cgsirp", [1], [null, null, null, null, null, null, null, null, ["g", "c"], [1, "Me", null, null, ["me@example.com"]]]]"#,
    );
    connected_with_id(&client, &transport, "abc123").await;
    transport.set_latency(Duration::from_millis(30));

    let (a, b, c) = tokio::join!(client.set_active(), client.set_active(), client.set_active());
    let announced: Vec<bool> = [a, b, c].into_iter().map(Result::unwrap).collect();

    assert_eq!(announced.iter().filter(|sent| **sent).count(), 1);
    assert_eq!(transport.requests_to("clients/setactiveclient").len(), 1);
    assert_eq!(client.activity().await, ClientActivity::IsActive);
}

#[tokio::test]
async fn test_set_active_announces_even_if_lookup_fails() {
    let (client, transport, _clock) = setup();
    transport.fail("contacts/getselfinfo", "500");
    connected_with_id(&client, &transport, "abc123").await;

    assert!(client.set_active().await.unwrap());
    let announced = transport.requests_to("clients/setactiveclient");
    assert_eq!(announced.len(), 1);
    assert_eq!(announced[0][2], json!("/abc123"));
}

#[tokio::test]
async fn test_requests_carry_client_id_in_header() {
    let (client, transport, _clock) = setup();
    connected_with_id(&client, &transport, "abc123").await;

    client
        .update_watermark("conv-1", 1_500_000_000_000_000)
        .await
        .unwrap();
    let bodies = transport.requests_to("conversations/updatewatermark");
    assert_eq!(bodies[0][0][1], json!(["abc123", null]));
    assert_eq!(bodies[0][2], json!(1_500_000_000_000_000u64));
}

#[tokio::test]
async fn test_delete_conversation_uses_clock_micros() {
    let (client, transport, _clock) = setup();
    client.delete_conversation("conv-1").await.unwrap();
    let bodies = transport.requests_to("conversations/deleteconversation");
    assert_eq!(bodies[0][2], json!(START * 1_000_000));
}

#[tokio::test]
async fn test_chat_messages_reach_transport_in_call_order() {
    let (client, transport, _clock) = setup();
    transport.set_latency(Duration::from_millis(20));

    let receipts: Vec<SendReceipt> = ["one", "two", "three"]
        .into_iter()
        .map(|text| client.send_chat_message("conv-1", OutgoingMessage::text(text)))
        .collect();
    let results = futures_util::future::join_all(receipts).await;
    assert!(results.iter().all(Result::is_ok));

    let texts: Vec<Json> = transport
        .requests_to("conversations/sendchatmessage")
        .iter()
        .map(|body| body[5][0][0][1].clone())
        .collect();
    assert_eq!(texts, vec![json!("one"), json!("two"), json!("three")]);
}

#[tokio::test]
async fn test_dropped_receipt_still_sends() {
    let (client, transport, _clock) = setup();
    drop(client.send_chat_message("conv-1", OutgoingMessage::text("fire and forget")));
    let last = client.send_chat_message("conv-1", OutgoingMessage::text("tracked"));
    last.await.unwrap();
    assert_eq!(transport.requests_to("conversations/sendchatmessage").len(), 2);
}

#[tokio::test]
async fn test_upload_image_follows_both_replies() {
    let (client, transport, _clock) = setup();
    let upload_url = client.config().upload_url.clone();
    transport.reply(
        &upload_url,
        r#"{"sessionStatus": {"externalFieldTransfers": [{"putInfo": {"url": "https://upload.example/put/1"}}]}}"#,
    );
    transport.reply(
        "https://upload.example/put/1",
        r#"{"sessionStatus": {"additionalInfo": {"uploader_service.GoogleRupioAdditionalInfo": {"completionInfo": {"customerSpecificInfo": {"photoid": "photo-7"}}}}}}"#,
    );

    let photo_id = client.upload_image(b"\x89PNG", "cat.png").await.unwrap();
    assert_eq!(photo_id, "photo-7");

    let raw: Vec<(String, String)> = transport
        .recorded()
        .into_iter()
        .filter_map(|r| match r {
            Recorded::Raw {
                url, content_type, ..
            } => Some((url, content_type)),
            _ => None,
        })
        .collect();
    assert_eq!(
        raw,
        vec![
            (
                upload_url,
                "application/x-www-form-urlencoded;charset=UTF-8".to_string()
            ),
            (
                "https://upload.example/put/1".to_string(),
                "application/octet-stream".to_string()
            ),
        ]
    );
}

#[tokio::test]
async fn test_upload_image_missing_photo_id_fails() {
    let (client, transport, _clock) = setup();
    let upload_url = client.config().upload_url.clone();
    transport.reply(
        &upload_url,
        r#"{"sessionStatus": {"externalFieldTransfers": [{"putInfo": {"url": "https://upload.example/put/2"}}]}}"#,
    );
    transport.reply("https://upload.example/put/2", r#"{"sessionStatus": {}}"#);

    let err = client.upload_image(b"data", "x.png").await.unwrap_err();
    assert!(matches!(err, ClientError::Upload { .. }));
}

#[tokio::test]
async fn test_disconnect_stops_push_handling() {
    let (client, transport, _clock) = setup();
    let mut events = client.subscribe();
    client.connect().await.unwrap();
    client.disconnect();

    transport.push(TransportEvent::Connected);
    let waited = tokio::time::timeout(Duration::from_millis(50), events.recv()).await;
    assert!(waited.is_err());
}
