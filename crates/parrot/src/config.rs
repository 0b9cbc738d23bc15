//! Client configuration.

use parrot_session::SessionConfig;
use serde::{Deserialize, Serialize};

/// Everything the engine needs to know about how to present itself and
/// how long to ask the server to remember things.
///
/// Missing keys fall back to the defaults, so a config file only has to
/// name what it changes:
///
/// ```json
/// { "language": "de", "session": { "set_active_limit_secs": 30 } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Client name sent in every request header.
    pub client_name: String,

    /// Language tag sent in every request header.
    pub language: String,

    /// Channel service subscribed to after each new client id.
    pub service_name: String,

    /// Where the image upload flow opens its session.
    pub upload_url: String,

    /// Reply size cap sent with `syncallnewevents`.
    pub max_response_size_bytes: u64,

    /// Lifetime of a presence set via `setpresence`.
    pub presence_timeout_secs: u32,

    /// Lifetime of a focus set via `setfocus`.
    pub focus_timeout_secs: u32,

    /// Buffered client events per subscriber. A subscriber that falls
    /// further behind than this misses events.
    pub event_capacity: usize,

    pub session: SessionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_name: "parrot".to_string(),
            language: "en".to_string(),
            service_name: "babel".to_string(),
            upload_url: "https://docs.google.com/upload/photos/resumable".to_string(),
            max_response_size_bytes: 1_048_576,
            presence_timeout_secs: 720,
            focus_timeout_secs: 20,
            event_capacity: 256,
            session: SessionConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Reads a config from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
