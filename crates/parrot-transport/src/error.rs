/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The channel was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// A request reached the server but didn't produce a usable reply.
    #[error("request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    /// Reading or writing the underlying stream failed.
    #[error("i/o error: {0}")]
    Io(#[source] std::io::Error),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}
