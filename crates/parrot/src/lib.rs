//! # Parrot
//!
//! Client engine for a chat service that speaks "lite" encoded protocol
//! buffers: nested JSON arrays whose positions are field numbers.
//!
//! The engine builds request bodies for every API endpoint, decodes the
//! replies, demultiplexes pushed state updates and keeps track of the
//! session's identity and active-client status. The connection itself is
//! supplied by the caller as a [`Transport`](parrot_transport::Transport).
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │  Client  (requests, push demux, outboxes, upload)  │
//! ├───────────────────────────────────────────────────┤
//! │  parrot-session  (client id, active-client state)  │
//! ├───────────────────────────────────────────────────┤
//! │  parrot-protocol (lite codec, envelope, records)   │
//! ├───────────────────────────────────────────────────┤
//! │  parrot-schema   (compiler, descriptors, Message)  │
//! └───────────────────────────────────────────────────┘
//!              ↕ parrot-transport (trait)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use parrot::prelude::*;
//!
//! let client = Client::new(transport, ClientConfig::default());
//! let mut events = client.subscribe();
//! client.connect().await?;
//!
//! client.set_active().await?;
//! client
//!     .send_chat_message("conversation-id", OutgoingMessage::text("hello"))
//!     .await?;
//! ```

mod client;
mod config;
mod error;
pub mod logging;
mod outbox;
mod push;
pub mod requests;
mod upload;

pub use client::Client;
pub use config::ClientConfig;
pub use error::ClientError;
pub use outbox::SendReceipt;
pub use push::ClientEvent;
pub use requests::{Endpoint, Formatting, ImageAttachment, OutgoingMessage, Segment};

/// Common imports for applications.
pub mod prelude {
    pub use crate::{
        Client, ClientConfig, ClientError, ClientEvent, ImageAttachment, OutgoingMessage, Segment,
        SendReceipt,
    };
    pub use parrot_protocol::{
        ActiveClientState, FocusType, NotificationLevel, StateUpdate, TypingType,
        WatermarkNotification,
    };
    pub use parrot_session::ClientActivity;
    pub use parrot_transport::{Transport, TransportEvent};
}
