//! Transport contract for Parrot.
//!
//! The engine never opens sockets itself. It talks to the service through
//! a [`Transport`]: a long-lived push channel that delivers raw arrays,
//! plus plain request/response calls for the API endpoints.
//!
//! # Feature Flags
//!
//! - `memory` — [`MemoryTransport`], an in-process transport that records
//!   traffic and serves canned replies. Used by tests.

mod error;
#[cfg(feature = "memory")]
mod memory;

pub use error::TransportError;
#[cfg(feature = "memory")]
pub use memory::{MemoryTransport, Recorded};

use std::collections::BTreeMap;
use std::future::Future;

use tokio::sync::mpsc;

/// Something that happened on the push channel.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The channel is open for the first time.
    Connected,
    /// The channel came back after a drop.
    Reconnected,
    /// The channel dropped. The transport may reconnect on its own.
    Disconnected,
    /// One pushed array, already split out of the stream framing.
    MessageReceived(Vec<serde_json::Value>),
}

/// A flat string map sent up the push channel.
pub type ChannelMap = BTreeMap<String, String>;

/// The service connection as the engine sees it.
///
/// Framing, long-polling, cookies and reconnect backoff all live behind
/// this trait. Methods return `Send` futures so the engine can drive them
/// from spawned tasks.
pub trait Transport: Send + Sync + 'static {
    /// Starts the push channel and returns its event stream.
    ///
    /// Calling it again replaces the previous stream; the old receiver
    /// then sees the end of the stream.
    fn listen(
        &self,
    ) -> impl Future<Output = Result<mpsc::UnboundedReceiver<TransportEvent>, TransportError>> + Send;

    /// Sends string maps up the push channel.
    fn send_maps(
        &self,
        maps: Vec<ChannelMap>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Calls an API endpoint (e.g. `conversations/settyping`) with a JSON
    /// body and returns the raw reply. `use_json` asks the server for a
    /// JSON reply instead of its default encoding.
    fn request(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
        use_json: bool,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Posts raw bytes to an absolute URL. Used by the image upload flow.
    fn raw_request(
        &self,
        url: &str,
        content_type: &str,
        data: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}
