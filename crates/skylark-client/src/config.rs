//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Client configuration
///
/// Key-material paths are derived from `key_dir` and `session_name`, so
/// every cached identity is an explicit configuration value rather than
/// ambient process state, and several identities can coexist side by side.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Client identifier sent in the hello message.
    pub client_id: String,
    /// Client software version string sent in the hello message.
    pub client_version: String,
    /// Platform label sent in the hello message.
    pub platform: String,
    /// Language tag sent as a hello parameter.
    pub lang: String,
    /// Text encoding sent as a hello parameter.
    pub encoding: String,
    /// Directory holding the cached key-material files.
    pub key_dir: PathBuf,
    /// Name scoping the cached key files for this identity.
    pub session_name: String,
    /// Bound on the wait for the next inbound envelope while the
    /// handshake is in flight. The wire protocol itself has no such
    /// guard; expiry transitions the session to `ConnectionLost`.
    pub handshake_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: "skylark-client".to_string(),
            client_version: "1.0".to_string(),
            platform: std::env::consts::OS.to_string(),
            lang: "en_US".to_string(),
            encoding: "UTF-8".to_string(),
            key_dir: PathBuf::from("."),
            session_name: "default".to_string(),
            handshake_timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Configuration for a named session identity.
    pub fn with_session_name(name: impl Into<String>) -> Self {
        Self {
            session_name: name.into(),
            ..Default::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.session_name.is_empty() {
            return Err("session_name must not be empty".to_string());
        }
        if self.session_name.contains(['/', '\\']) {
            return Err("session_name must not contain path separators".to_string());
        }
        if self.client_id.is_empty() {
            return Err("client_id must not be empty".to_string());
        }
        if self.handshake_timeout_secs == 0 {
            return Err("handshake_timeout_secs must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Handshake timeout as a [`Duration`].
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_name_rules() {
        let mut config = ClientConfig::with_session_name("");
        assert!(config.validate().is_err());

        config.session_name = "has/slash".to_string();
        assert!(config.validate().is_err());

        config.session_name = "alice".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ClientConfig {
            handshake_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
