//! In-process transport for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Notify, mpsc};

use crate::{ChannelMap, Transport, TransportError, TransportEvent};

/// One piece of outbound traffic, in the order it was sent.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Maps(Vec<ChannelMap>),
    Request {
        endpoint: String,
        body: serde_json::Value,
        use_json: bool,
    },
    Raw {
        url: String,
        content_type: String,
        data: Vec<u8>,
    },
}

type Reply = Result<Vec<u8>, String>;

#[derive(Default)]
struct State {
    events: Option<mpsc::UnboundedSender<TransportEvent>>,
    pending: Vec<TransportEvent>,
    log: Vec<Recorded>,
    replies: HashMap<String, VecDeque<Reply>>,
    latency: Duration,
}

/// A [`Transport`] that never leaves the process.
///
/// Outbound calls are recorded. Replies are queued per endpoint path (or
/// per URL for raw requests) and served first-in first-out; a call with
/// nothing queued gets `[]`. Events pushed before anyone listens are
/// buffered and delivered on the next [`listen`](Transport::listen).
#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
    activity: Notify,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Scripting ----------------------------------------------------------

    /// Delivers an event to the current listener.
    pub fn push(&self, event: TransportEvent) {
        let mut state = self.state();
        if let Some(tx) = state.events.as_ref().filter(|tx| !tx.is_closed()) {
            let _ = tx.send(event);
            return;
        }
        state.pending.push(event);
    }

    /// Delivers one raw pushed array.
    pub fn push_message(&self, raw: Vec<serde_json::Value>) {
        self.push(TransportEvent::MessageReceived(raw));
    }

    /// Ends the current event stream.
    pub fn close(&self) {
        self.state().events = None;
    }

    /// Queues a reply for `key` (an endpoint path or an upload URL).
    pub fn reply(&self, key: &str, body: impl Into<Vec<u8>>) {
        self.state()
            .replies
            .entry(key.to_string())
            .or_default()
            .push_back(Ok(body.into()));
    }

    /// Queues a failure for `key`.
    pub fn fail(&self, key: &str, reason: &str) {
        self.state()
            .replies
            .entry(key.to_string())
            .or_default()
            .push_back(Err(reason.to_string()));
    }

    /// Delays every request and raw request by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = latency;
    }

    // -- Inspection ---------------------------------------------------------

    /// Everything sent so far.
    pub fn recorded(&self) -> Vec<Recorded> {
        self.state().log.clone()
    }

    /// `(endpoint, body)` of every API request, in send order.
    pub fn requests(&self) -> Vec<(String, serde_json::Value)> {
        self.state()
            .log
            .iter()
            .filter_map(|r| match r {
                Recorded::Request { endpoint, body, .. } => Some((endpoint.clone(), body.clone())),
                _ => None,
            })
            .collect()
    }

    /// Bodies of the requests sent to one endpoint.
    pub fn requests_to(&self, endpoint: &str) -> Vec<serde_json::Value> {
        self.requests()
            .into_iter()
            .filter(|(e, _)| e == endpoint)
            .map(|(_, body)| body)
            .collect()
    }

    /// Every `send_maps` call, in send order.
    pub fn sent_maps(&self) -> Vec<Vec<ChannelMap>> {
        self.state()
            .log
            .iter()
            .filter_map(|r| match r {
                Recorded::Maps(maps) => Some(maps.clone()),
                _ => None,
            })
            .collect()
    }

    /// Waits until at least `count` items have been recorded.
    pub async fn wait_for_traffic(&self, count: usize) {
        loop {
            let notified = self.activity.notified();
            if self.state().log.len() >= count {
                return;
            }
            notified.await;
        }
    }

    // -- Internals ----------------------------------------------------------

    fn record(&self, item: Recorded) {
        self.state().log.push(item);
        self.activity.notify_waiters();
    }

    async fn serve(&self, key: &str) -> Result<Vec<u8>, TransportError> {
        let (reply, latency) = {
            let mut state = self.state();
            let reply = state.replies.get_mut(key).and_then(VecDeque::pop_front);
            (reply, state.latency)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match reply {
            None => Ok(b"[]".to_vec()),
            Some(Ok(body)) => Ok(body),
            Some(Err(reason)) => Err(TransportError::RequestFailed {
                endpoint: key.to_string(),
                reason,
            }),
        }
    }
}

impl Transport for MemoryTransport {
    async fn listen(&self) -> Result<mpsc::UnboundedReceiver<TransportEvent>, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state();
        for event in state.pending.drain(..) {
            let _ = tx.send(event);
        }
        state.events = Some(tx);
        tracing::debug!("memory transport listening");
        Ok(rx)
    }

    async fn send_maps(&self, maps: Vec<ChannelMap>) -> Result<(), TransportError> {
        tracing::debug!(count = maps.len(), "memory transport send_maps");
        self.record(Recorded::Maps(maps));
        Ok(())
    }

    async fn request(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
        use_json: bool,
    ) -> Result<Vec<u8>, TransportError> {
        tracing::debug!(%endpoint, "memory transport request");
        self.record(Recorded::Request {
            endpoint: endpoint.to_string(),
            body: body.clone(),
            use_json,
        });
        self.serve(endpoint).await
    }

    async fn raw_request(
        &self,
        url: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<Vec<u8>, TransportError> {
        tracing::debug!(%url, %content_type, bytes = data.len(), "memory transport raw request");
        self.record(Recorded::Raw {
            url: url.to_string(),
            content_type: content_type.to_string(),
            data: data.to_vec(),
        });
        self.serve(url).await
    }
}
