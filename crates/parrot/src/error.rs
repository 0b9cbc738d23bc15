//! Unified error type for the Parrot engine.

use parrot_protocol::ProtocolError;
use parrot_schema::SchemaError;
use parrot_session::SessionError;
use parrot_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Every engine call returns this one type. The `#[from]` variants let `?`
/// convert errors from the lower layers.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The transport couldn't deliver a request or returned a failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A reply or pushed payload didn't decode.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// The call was refused before anything was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An upload reply lacked the expected key.
    #[error("upload reply has no `{path}`")]
    Upload { path: String },

    /// The conversation's outbox stopped before the send completed.
    #[error("outbox for conversation {0} is closed")]
    OutboxClosed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let client_err: ClientError = err.into();
        assert!(matches!(client_err, ClientError::Transport(_)));
        assert!(client_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let client_err: ClientError = err.into();
        assert!(matches!(client_err, ClientError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let client_err: ClientError = SessionError::NoClientId.into();
        assert!(matches!(client_err, ClientError::Session(_)));
    }

    #[test]
    fn test_upload_error_names_missing_path() {
        let err = ClientError::Upload {
            path: "sessionStatus.externalFieldTransfers[0].putInfo.url".into(),
        };
        assert_eq!(
            err.to_string(),
            "upload reply has no `sessionStatus.externalFieldTransfers[0].putInfo.url`"
        );
    }
}
