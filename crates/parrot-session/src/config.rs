//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing knobs for active-client negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Minimum gap between two active-client announcements while this
    /// client is already active. Written in seconds in config files.
    ///
    /// Default: 60 seconds.
    #[serde(with = "secs", rename = "set_active_limit_secs")]
    pub set_active_limit: Duration,

    /// How long the server should treat this client as active after an
    /// announcement.
    ///
    /// Default: 120 seconds.
    pub active_timeout_secs: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            set_active_limit: Duration::from_secs(60),
            active_timeout_secs: 120,
        }
    }
}

/// `Duration` as whole seconds.
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.set_active_limit, Duration::from_secs(60));
        assert_eq!(config.active_timeout_secs, 120);
    }

    #[test]
    fn test_session_config_reads_seconds() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"set_active_limit_secs": 5}"#).unwrap();
        assert_eq!(config.set_active_limit, Duration::from_secs(5));
        assert_eq!(config.active_timeout_secs, 120);
    }
}
