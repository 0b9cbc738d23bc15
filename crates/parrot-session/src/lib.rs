//! Session identity for Parrot.
//!
//! This crate tracks who this client is to the server and whether it is
//! the account's active client:
//!
//! 1. **Identity** — the client id pushed by the server and the account
//!    email, resolved lazily ([`SessionState`]).
//! 2. **Active-client negotiation** — an optimistic, rate-limited state
//!    machine deciding when to announce this client as active
//!    ([`SessionState::begin_activation`], [`Activation`]).
//! 3. **Time** — a [`Clock`] so the rate limit can be tested without
//!    sleeping ([`SystemClock`], [`ManualClock`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Engine (above)     ← owns one SessionState behind a lock
//!     ↕
//! Session (this crate)
//!     ↕
//! Protocol (below)   ← ActiveClientState from pushed state updates
//! ```

mod clock;
mod config;
mod error;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SessionConfig;
pub use error::SessionError;
pub use state::{Activation, ClientActivity, SessionState};
