//! Core types shared across the Skylark crates

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Timestamp in seconds since the Unix epoch.
///
/// The protocol stamps every outbound envelope with whole seconds, so this
/// type works in seconds rather than milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create a timestamp for the current time.
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp())
    }

    /// Create from seconds since the Unix epoch.
    pub fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Get as seconds since the Unix epoch.
    pub fn as_secs(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User identity and attributes as reported by the server.
///
/// Only the field matching the chosen login mode is populated on outbound
/// requests; the server fills in the rest on a successful login.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// Server-assigned or caller-supplied user identifier.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    /// Phone number, populated in phone login mode.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phone: String,
    /// Email address, populated in email login mode.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub nickname: String,
    /// Free-form attributes. The password travels here (`"pwd"`) in
    /// user-id login mode and nowhere else.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl UserInfo {
    /// User record with only the phone field set.
    pub fn with_phone(phone: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            ..Default::default()
        }
    }

    /// User record with only the email field set.
    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Default::default()
        }
    }

    /// User record with a user id and a password parameter.
    pub fn with_user_id(user_id: impl Into<String>, password: impl Into<String>) -> Self {
        let mut params = BTreeMap::new();
        params.insert("pwd".to_string(), password.into());
        Self {
            user_id: user_id.into(),
            params,
            ..Default::default()
        }
    }
}
