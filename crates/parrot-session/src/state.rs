//! Session state and the active-client state machine.
//!
//! The server allows one "active" client per account and pushes the
//! current holder in every state update. A client claims the role with a
//! set-active-client request, which is rate limited here:
//!
//! ```text
//!              begin_activation (commit, then announce)
//!   Unknown ───────────────────────────────────────────→ IsActive
//!   IsNotActive ───────────────────────────────────────→ IsActive
//!   IsActive (limit elapsed) ──────────────────────────→ IsActive
//!   IsActive (within limit) ── Throttled, nothing sent
//!
//!   any ──(pushed ActiveClientState)──→ IsActive | IsNotActive
//! ```
//!
//! The commit happens before the request goes out, so callers that hold
//! the session lock while deciding get at most one announcement in flight.

use std::time::Duration;

use parrot_protocol::ActiveClientState;

use crate::SessionError;

/// This client's view of whether it is the account's active client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientActivity {
    /// Nothing announced or observed yet.
    #[default]
    Unknown,
    IsActive,
    IsNotActive,
}

impl From<ActiveClientState> for ClientActivity {
    fn from(state: ActiveClientState) -> Self {
        match state {
            ActiveClientState::IsActive => Self::IsActive,
            ActiveClientState::NoActive | ActiveClientState::OtherActive => Self::IsNotActive,
        }
    }
}

/// What the caller of [`SessionState::begin_activation`] should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// No client id yet; nothing can be announced.
    NoClientId,
    /// Already active and the rate limit hasn't elapsed.
    Throttled,
    /// State was committed to `IsActive`; send the announcement. When
    /// `email` is `None` the caller should resolve it first.
    Announce {
        client_id: String,
        email: Option<String>,
    },
}

/// Identity and activity of this client, owned by the engine.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    client_id: Option<String>,
    email: Option<String>,
    activity: ClientActivity,
    last_active_epoch_secs: f64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// The client id, or `NoClientId` if none has been assigned.
    pub fn require_client_id(&self) -> Result<&str, SessionError> {
        self.client_id().ok_or(SessionError::NoClientId)
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn activity(&self) -> ClientActivity {
        self.activity
    }

    pub fn last_active_epoch_secs(&self) -> f64 {
        self.last_active_epoch_secs
    }

    /// Records a client id from a push envelope. Returns `true` if it
    /// differs from the one already held.
    pub fn observe_client_id(&mut self, client_id: &str) -> bool {
        if self.client_id.as_deref() == Some(client_id) {
            return false;
        }
        tracing::info!(%client_id, "client id assigned");
        self.client_id = Some(client_id.to_string());
        true
    }

    /// Decides whether to announce this client as active and, if so,
    /// commits `IsActive` with `now` as the announcement time.
    pub fn begin_activation(&mut self, now_epoch_secs: f64, limit: Duration) -> Activation {
        let Some(client_id) = self.client_id.clone() else {
            return Activation::NoClientId;
        };

        let timed_out = now_epoch_secs - self.last_active_epoch_secs > limit.as_secs_f64();
        if self.activity == ClientActivity::IsActive && !timed_out {
            return Activation::Throttled;
        }

        self.activity = ClientActivity::IsActive;
        self.last_active_epoch_secs = now_epoch_secs;
        Activation::Announce {
            client_id,
            email: self.email.clone(),
        }
    }

    /// Applies the active-client state the server pushed.
    pub fn apply_remote_activity(&mut self, state: ActiveClientState) {
        let activity = ClientActivity::from(state);
        if activity != self.activity {
            tracing::debug!(from = ?self.activity, to = ?activity, "active client state changed");
        }
        self.activity = activity;
    }

    /// Stores the account email once it has been looked up.
    pub fn resolve_email(&mut self, email: impl Into<String>) {
        self.email = Some(email.into());
    }

    /// `email/client_id`, the name this client announces itself under.
    /// The email part is empty if it hasn't been resolved.
    pub fn identity(&self) -> Option<String> {
        let client_id = self.client_id.as_deref()?;
        Some(format!("{}/{client_id}", self.email.as_deref().unwrap_or("")))
    }

    /// Forgets everything, as on a fresh connection.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: Duration = Duration::from_secs(60);

    fn with_client_id() -> SessionState {
        let mut state = SessionState::new();
        state.observe_client_id("client-1");
        state
    }

    #[test]
    fn test_observe_client_id_reports_only_new_ids() {
        let mut state = SessionState::new();
        assert!(state.observe_client_id("a"));
        assert!(!state.observe_client_id("a"));
        assert!(state.observe_client_id("b"));
        assert_eq!(state.client_id(), Some("b"));
    }

    #[test]
    fn test_begin_activation_without_client_id() {
        let mut state = SessionState::new();
        assert_eq!(state.begin_activation(100.0, LIMIT), Activation::NoClientId);
        assert_eq!(state.activity(), ClientActivity::Unknown);
        assert!(matches!(
            state.require_client_id(),
            Err(SessionError::NoClientId)
        ));
    }

    #[test]
    fn test_begin_activation_commits_before_announce() {
        let mut state = with_client_id();
        let next = state.begin_activation(1_000.0, LIMIT);
        assert_eq!(
            next,
            Activation::Announce {
                client_id: "client-1".into(),
                email: None
            }
        );
        assert_eq!(state.activity(), ClientActivity::IsActive);
        assert_eq!(state.last_active_epoch_secs(), 1_000.0);
    }

    #[test]
    fn test_begin_activation_throttles_within_limit() {
        let mut state = with_client_id();
        state.begin_activation(1_000.0, LIMIT);
        assert_eq!(state.begin_activation(1_001.0, LIMIT), Activation::Throttled);
        assert_eq!(state.begin_activation(1_060.0, LIMIT), Activation::Throttled);
        assert!(matches!(
            state.begin_activation(1_060.5, LIMIT),
            Activation::Announce { .. }
        ));
    }

    #[test]
    fn test_begin_activation_after_remote_deactivation() {
        let mut state = with_client_id();
        state.begin_activation(1_000.0, LIMIT);
        state.apply_remote_activity(ActiveClientState::OtherActive);
        assert_eq!(state.activity(), ClientActivity::IsNotActive);
        assert!(matches!(
            state.begin_activation(1_001.0, LIMIT),
            Activation::Announce { .. }
        ));
    }

    #[test]
    fn test_identity_uses_resolved_email() {
        let mut state = with_client_id();
        assert_eq!(state.identity().as_deref(), Some("/client-1"));
        state.resolve_email("me@example.com");
        assert_eq!(state.identity().as_deref(), Some("me@example.com/client-1"));
        assert!(matches!(
            state.begin_activation(5.0, LIMIT),
            Activation::Announce { email: Some(ref e), .. } if e == "me@example.com"
        ));
    }

    #[test]
    fn test_reset_forgets_identity() {
        let mut state = with_client_id();
        state.begin_activation(5.0, LIMIT);
        state.reset();
        assert_eq!(state.client_id(), None);
        assert_eq!(state.activity(), ClientActivity::Unknown);
    }
}
