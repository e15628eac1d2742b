//! Message envelope and payload variants
//!
//! Every frame exchanged with the server is one [`Envelope`]: a message
//! type tag, protocol version, Unix timestamp, and a payload drawn from a
//! closed set of variants. The type tag must agree with the payload
//! variant; dispatch treats a mismatch as noise and drops it.
//!
//! Stage, status, and result fields arrive as strings on the wire.
//! Unrecognized values decode to an `Unknown` variant instead of failing
//! the whole envelope, so new server-side values never break an older
//! client.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Timestamp, UserInfo};
use crate::PROTOCOL_VERSION;

/// Discriminant for the envelope payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageType {
    /// Hello / stage directive.
    Hello,
    /// Key-exchange sub-protocol message.
    KeyExchange,
    /// User operation request (login, registration).
    UserOperation,
    /// Server verdict on a user operation.
    UserOperationResult,
    /// Server-reported error.
    Error,
}

/// The unit of exchange with the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Payload discriminant. Must match the populated payload variant.
    pub message_type: MessageType,
    /// Protocol version, always [`PROTOCOL_VERSION`] on outbound envelopes.
    pub version: u32,
    /// Unix timestamp in seconds at creation time.
    pub timestamp: Timestamp,
    /// The typed payload.
    pub payload: Payload,
}

impl Envelope {
    /// Wrap a payload in an envelope stamped with the current time.
    ///
    /// The message type is derived from the payload variant, so the
    /// type/payload invariant holds by construction.
    pub fn new(payload: Payload) -> Self {
        Self {
            message_type: payload.message_type(),
            version: PROTOCOL_VERSION,
            timestamp: Timestamp::now(),
            payload,
        }
    }

    /// True when the type tag agrees with the payload variant.
    pub fn is_consistent(&self) -> bool {
        self.message_type == self.payload.message_type()
    }
}

/// Closed set of envelope payloads, tagged by variant name on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Payload {
    /// Hello / stage directive.
    Hello(HelloPayload),
    /// Key-exchange sub-protocol message.
    KeyExchange(KeyExchangePayload),
    /// User operation request.
    UserOperation(UserOperationRequest),
    /// Server verdict on a user operation.
    UserOperationResult(UserOperationResult),
    /// Server-reported error.
    Error(ErrorPayload),
}

impl Payload {
    /// The message type matching this payload variant.
    pub fn message_type(&self) -> MessageType {
        match self {
            Payload::Hello(_) => MessageType::Hello,
            Payload::KeyExchange(_) => MessageType::KeyExchange,
            Payload::UserOperation(_) => MessageType::UserOperation,
            Payload::UserOperationResult(_) => MessageType::UserOperationResult,
            Payload::Error(_) => MessageType::Error,
        }
    }
}

/// Hello message: opens the session and carries the server's stage
/// directives back to the client.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloPayload {
    /// Client identifier (host or device name).
    #[serde(default)]
    pub client_id: String,
    /// Client software version string.
    #[serde(default)]
    pub version: String,
    /// Client platform label.
    #[serde(default)]
    pub platform: String,
    /// Handshake stage directive.
    #[serde(default)]
    pub stage: HelloStage,
    /// Cached key fingerprint, `0` when no key is cached.
    #[serde(default)]
    pub fingerprint: i64,
    /// Free-form parameters: `lang`, `encoding`, and on a resume attempt
    /// `checkTokenData` (base64 of the encrypted current timestamp).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

/// Stage directive carried in a hello message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HelloStage {
    /// Client's opening hello.
    ClientHello,
    /// Server wants a key exchange before login.
    WaitLogin,
    /// Key already agreed; server wants login or registration.
    NeedLogin,
    /// Cached key accepted; session is ready for data.
    WaitData,
    /// Unrecognized stage value; ignored by dispatch.
    #[default]
    Unknown,
}

impl From<String> for HelloStage {
    fn from(s: String) -> Self {
        match s.as_str() {
            "clienthello" => HelloStage::ClientHello,
            "waitlogin" => HelloStage::WaitLogin,
            "needlogin" => HelloStage::NeedLogin,
            "waitdata" => HelloStage::WaitData,
            _ => HelloStage::Unknown,
        }
    }
}

impl From<HelloStage> for String {
    fn from(stage: HelloStage) -> Self {
        match stage {
            HelloStage::ClientHello => "clienthello",
            HelloStage::WaitLogin => "waitlogin",
            HelloStage::NeedLogin => "needlogin",
            HelloStage::WaitData => "waitdata",
            HelloStage::Unknown => "unknown",
        }
        .to_string()
    }
}

/// Key-exchange sub-protocol message, stages 1 through 4.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyExchangePayload {
    /// Numbered step: 1 offer, 2 counter-offer + fingerprint,
    /// 3 confirmation, 4 final verdict.
    pub stage: u32,
    /// Fingerprint of the shared secret, `0` until agreed.
    #[serde(default)]
    pub fingerprint: i64,
    /// Reserved for an RSA-based variant; always `0` here.
    #[serde(default)]
    pub rsa_fingerprint: i64,
    /// Ephemeral public key, SPKI/PEM bytes, base64 on the wire.
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Vec::is_empty")]
    pub public_key: Vec<u8>,
    /// Encrypted proof-of-possession token (stage 3), base64 on the wire.
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Vec::is_empty")]
    pub encrypted_payload: Vec<u8>,
    /// Symmetric algorithm label, `"AES-CTR"`.
    #[serde(default)]
    pub encryption_algorithm: String,
    /// Exchange status, meaningful in stages 3 and 4.
    #[serde(default)]
    pub status: ExchangeStatus,
}

/// Status carried in key-exchange stages 3 and 4.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExchangeStatus {
    /// Client confirmation: key agreed on this side.
    Ready,
    /// Verdict: resume accepted, session is ready for data.
    WaitData,
    /// Verdict: key agreed but login is still required.
    NeedLogin,
    /// Unrecognized status value; ignored by dispatch.
    #[default]
    Unknown,
}

impl From<String> for ExchangeStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ready" => ExchangeStatus::Ready,
            "waitdata" => ExchangeStatus::WaitData,
            "needlogin" => ExchangeStatus::NeedLogin,
            _ => ExchangeStatus::Unknown,
        }
    }
}

impl From<ExchangeStatus> for String {
    fn from(status: ExchangeStatus) -> Self {
        match status {
            ExchangeStatus::Ready => "ready",
            ExchangeStatus::WaitData => "waitdata",
            ExchangeStatus::NeedLogin => "needlogin",
            ExchangeStatus::Unknown => "unknown",
        }
        .to_string()
    }
}

/// User operation kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UserOperation {
    /// Authenticate an existing user.
    Login,
    /// Register a new user.
    RegisterUser,
    /// Unrecognized operation; ignored by dispatch.
    #[default]
    Unknown,
}

impl From<String> for UserOperation {
    fn from(s: String) -> Self {
        match s.as_str() {
            "login" => UserOperation::Login,
            "registerUser" => UserOperation::RegisterUser,
            _ => UserOperation::Unknown,
        }
    }
}

impl From<UserOperation> for String {
    fn from(op: UserOperation) -> Self {
        match op {
            UserOperation::Login => "login",
            UserOperation::RegisterUser => "registerUser",
            UserOperation::Unknown => "unknown",
        }
        .to_string()
    }
}

/// Client-to-server user operation request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationRequest {
    /// Requested operation.
    pub operation: UserOperation,
    /// User identity; only the field matching the login mode is set.
    #[serde(default)]
    pub user: UserInfo,
    /// Request parameters; carries `loginmode`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

/// Server verdict on a user operation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationResult {
    /// Operation this verdict answers.
    pub operation: UserOperation,
    /// Overall outcome.
    #[serde(default)]
    pub result: OpResult,
    /// Next-step directive.
    #[serde(default)]
    pub status: OpStatus,
    /// User records; first entry is the authenticated user on success.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<UserInfo>,
}

/// Outcome of a user operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OpResult {
    /// Operation succeeded.
    Ok,
    /// Operation failed.
    Fail,
    /// Unrecognized result value.
    #[default]
    Unknown,
}

impl From<String> for OpResult {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ok" => OpResult::Ok,
            "fail" => OpResult::Fail,
            _ => OpResult::Unknown,
        }
    }
}

impl From<OpResult> for String {
    fn from(r: OpResult) -> Self {
        match r {
            OpResult::Ok => "ok",
            OpResult::Fail => "fail",
            OpResult::Unknown => "unknown",
        }
        .to_string()
    }
}

/// Next-step directive attached to a user operation verdict.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OpStatus {
    /// Fully authenticated.
    LoginOk,
    /// A verification code step is pending.
    WaitCode,
    /// Registered but authentication is still required.
    NeedLogin,
    /// Unrecognized status value.
    #[default]
    Unknown,
}

impl From<String> for OpStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "loginok" => OpStatus::LoginOk,
            "waitcode" => OpStatus::WaitCode,
            "needlogin" => OpStatus::NeedLogin,
            _ => OpStatus::Unknown,
        }
    }
}

impl From<OpStatus> for String {
    fn from(status: OpStatus) -> Self {
        match status {
            OpStatus::LoginOk => "loginok",
            OpStatus::WaitCode => "waitcode",
            OpStatus::NeedLogin => "needlogin",
            OpStatus::Unknown => "unknown",
        }
        .to_string()
    }
}

/// Server-reported error detail.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// Human-readable error message.
    #[serde(default)]
    pub message: String,
}

// Serde helper for base64-encoded byte fields
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_type_matches_payload() {
        let env = Envelope::new(Payload::Hello(HelloPayload::default()));
        assert_eq!(env.message_type, MessageType::Hello);
        assert_eq!(env.version, PROTOCOL_VERSION);
        assert!(env.is_consistent());
    }

    #[test]
    fn test_hello_stage_wire_names() {
        for (stage, name) in [
            (HelloStage::ClientHello, "clienthello"),
            (HelloStage::WaitLogin, "waitlogin"),
            (HelloStage::NeedLogin, "needlogin"),
            (HelloStage::WaitData, "waitdata"),
        ] {
            assert_eq!(String::from(stage), name);
            assert_eq!(HelloStage::from(name.to_string()), stage);
        }
    }

    #[test]
    fn test_unknown_stage_tolerated() {
        let json = r#"{
            "clientId": "c1",
            "version": "1.0",
            "platform": "linux",
            "stage": "brand-new-stage",
            "fingerprint": 0
        }"#;
        let hello: HelloPayload = serde_json::from_str(json).unwrap();
        assert_eq!(hello.stage, HelloStage::Unknown);
    }

    #[test]
    fn test_key_exchange_base64_fields() {
        let payload = KeyExchangePayload {
            stage: 1,
            public_key: b"-----BEGIN PUBLIC KEY-----".to_vec(),
            encryption_algorithm: crate::ENCRYPTION_ALGORITHM.to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json["publicKey"].is_string());
        assert!(json.get("encryptedPayload").is_none());

        let back: KeyExchangePayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_envelope_json_roundtrip() {
        let env = Envelope::new(Payload::UserOperationResult(UserOperationResult {
            operation: UserOperation::Login,
            result: OpResult::Ok,
            status: OpStatus::LoginOk,
            users: vec![UserInfo::with_phone("+15551234567")],
        }));
        let bytes = serde_json::to_vec(&env).unwrap();
        let back: Envelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, env);
        assert!(back.is_consistent());
    }

    #[test]
    fn test_negative_fingerprint_survives() {
        let payload = KeyExchangePayload {
            stage: 2,
            fingerprint: -42,
            ..Default::default()
        };
        let json = serde_json::to_string(&payload).unwrap();
        let back: KeyExchangePayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back.fingerprint, -42);
    }
}
