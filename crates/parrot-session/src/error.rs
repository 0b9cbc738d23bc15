//! Error types for the session layer.

/// Errors that can occur while managing session identity.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The server hasn't assigned this connection a client id yet. It
    /// arrives in the first push envelope after the channel opens.
    #[error("no client id has been assigned yet")]
    NoClientId,
}
