//! Session state machine
//!
//! Owns the one [`ClientState`] of a session, reacts to inbound
//! envelopes, and drives the key-exchange engine. All protocol logic
//! lives here; the state machine is synchronous and performs no I/O
//! beyond the key store, which makes every scenario testable without a
//! transport.
//!
//! Dispatch is permissive: envelopes whose type tag disagrees with the
//! payload, unknown message types, and unknown stage or status values
//! are dropped without a state change.

use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use skylark_core::{
    ClientState, Envelope, ErrorPayload, ExchangeStatus, HelloPayload, HelloStage,
    KeyExchangePayload, MessageType, OpResult, OpStatus, Payload, Timestamp, UserInfo,
    UserOperation, UserOperationRequest, UserOperationResult, ENCRYPTION_ALGORITHM,
};
use skylark_crypto::{KeyExchange, KeyStore};

use crate::config::ClientConfig;
use crate::error::Result;
use crate::events::SessionEvents;

/// How the user identifies themselves when logging in or registering.
///
/// The password travels only in [`LoginMode::UserId`] mode, as a request
/// parameter; phone and email modes never transport one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginMode {
    /// Identify by phone number.
    Phone,
    /// Identify by email address.
    Email,
    /// Identify by user id with a password parameter.
    UserId,
}

impl LoginMode {
    /// Wire tag for the `loginmode` request parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginMode::Phone => "phone",
            LoginMode::Email => "email",
            LoginMode::UserId => "userid",
        }
    }
}

/// The session state machine.
pub struct Session {
    config: ClientConfig,
    engine: KeyExchange,
    store: KeyStore,
    state: ClientState,
    sub_state: Option<ClientState>,
    user_info: Option<UserInfo>,
    events: Box<dyn SessionEvents>,
}

impl Session {
    /// Create a session, loading any cached key material for the
    /// configured identity. A cold start (no cached key) is expected and
    /// not an error.
    pub fn new(config: ClientConfig, events: Box<dyn SessionEvents>) -> Self {
        let store = KeyStore::for_session(&config.key_dir, &config.session_name);
        let engine = KeyExchange::from_cached(store.load());
        if engine.has_cached_key() {
            info!(
                fingerprint = engine.cached_fingerprint(),
                "Loaded cached session key"
            );
        }
        Self {
            config,
            engine,
            store,
            state: ClientState::Initial,
            sub_state: None,
            user_info: None,
            events,
        }
    }

    /// Current primary state.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Sub-state attached to the current state, if any.
    pub fn sub_state(&self) -> Option<ClientState> {
        self.sub_state
    }

    /// Authenticated user, populated only after a successful login.
    pub fn user_info(&self) -> Option<&UserInfo> {
        self.user_info.as_ref()
    }

    pub(crate) fn set_state(&mut self, state: ClientState, sub_state: Option<ClientState>) {
        debug!(%state, ?sub_state, "State transition");
        self.state = state;
        self.sub_state = sub_state;
        self.events.on_state_change(state, sub_state);
    }

    pub(crate) fn notify_error(&mut self, detail: &str) {
        self.events.on_error(detail);
    }

    /// Move to `Closed` without notifying the listener; used after a
    /// caller-initiated stop, which must suppress further callbacks.
    pub(crate) fn finish_close(&mut self) {
        self.state = ClientState::Closed;
        self.sub_state = None;
    }

    /// Entry action on transport connect: build the opening hello.
    ///
    /// With a cached key the hello carries the cached fingerprint and a
    /// `checkTokenData` parameter, the base64 of the encrypted current
    /// timestamp, proving possession of the secret. Without one the
    /// fingerprint is `0` and the token is omitted.
    pub fn on_connect(&mut self) -> Result<Envelope> {
        let mut params = BTreeMap::new();
        params.insert("lang".to_string(), self.config.lang.clone());
        params.insert("encoding".to_string(), self.config.encoding.clone());

        let mut fingerprint = 0;
        if self.engine.has_cached_key() {
            fingerprint = self.engine.cached_fingerprint();
            let token = self
                .engine
                .encrypt_to_base64(Timestamp::now().to_string().as_bytes())?;
            params.insert("checkTokenData".to_string(), token);
            info!(fingerprint, "Attempting session resume with cached key");
        } else {
            info!("No cached key, starting fresh handshake");
        }

        self.set_state(ClientState::Hello, None);
        Ok(Envelope::new(Payload::Hello(HelloPayload {
            client_id: self.config.client_id.clone(),
            version: self.config.client_version.clone(),
            platform: self.config.platform.clone(),
            stage: HelloStage::ClientHello,
            fingerprint,
            params,
        })))
    }

    /// Dispatch one inbound envelope, returning the reply to send, if
    /// any. Exactly one handler runs per envelope.
    pub fn handle(&mut self, envelope: &Envelope) -> Result<Option<Envelope>> {
        match (envelope.message_type, &envelope.payload) {
            (MessageType::Hello, Payload::Hello(hello)) => self.on_hello(hello),
            (MessageType::KeyExchange, Payload::KeyExchange(keyex)) => self.on_key_exchange(keyex),
            (MessageType::UserOperationResult, Payload::UserOperationResult(result)) => {
                self.on_user_op_result(result)
            }
            (MessageType::Error, Payload::Error(error)) => self.on_server_error(error),
            _ => {
                debug!(message_type = ?envelope.message_type, "Ignoring unhandled or inconsistent envelope");
                Ok(None)
            }
        }
    }

    fn on_hello(&mut self, hello: &HelloPayload) -> Result<Option<Envelope>> {
        if !self.state.in_handshake() {
            debug!(state = %self.state, "Hello outside handshake, ignoring");
            return Ok(None);
        }

        match hello.stage {
            HelloStage::WaitLogin => {
                // Server wants a fresh key; open the exchange
                self.set_state(ClientState::KeyExchange, None);
                self.engine.generate_key_pair();
                let public_key = self.engine.public_key_pem()?;
                Ok(Some(Envelope::new(Payload::KeyExchange(
                    KeyExchangePayload {
                        stage: 1,
                        fingerprint: 0,
                        rsa_fingerprint: 0,
                        public_key,
                        encrypted_payload: Vec::new(),
                        encryption_algorithm: ENCRYPTION_ALGORITHM.to_string(),
                        status: ExchangeStatus::Unknown,
                    },
                ))))
            }
            HelloStage::NeedLogin => {
                info!("Server requires login");
                self.set_state(ClientState::WaitLogin, None);
                Ok(None)
            }
            HelloStage::WaitData => {
                info!("Cached key accepted, session ready");
                self.set_state(ClientState::Ready, None);
                Ok(None)
            }
            HelloStage::ClientHello | HelloStage::Unknown => {
                debug!(stage = ?hello.stage, "Ignoring hello stage");
                Ok(None)
            }
        }
    }

    fn on_key_exchange(&mut self, keyex: &KeyExchangePayload) -> Result<Option<Envelope>> {
        match keyex.stage {
            2 => self.on_key_exchange_counter_offer(keyex),
            4 => {
                match keyex.status {
                    ExchangeStatus::WaitData => {
                        info!("Key exchange complete, session ready");
                        self.set_state(ClientState::Ready, Some(ClientState::KeyExchange));
                    }
                    ExchangeStatus::NeedLogin => {
                        info!("Key exchange complete, login required");
                        self.set_state(ClientState::WaitLogin, Some(ClientState::KeyExchange));
                    }
                    ExchangeStatus::Ready | ExchangeStatus::Unknown => {
                        debug!(status = ?keyex.status, "Ignoring key-exchange verdict status");
                    }
                }
                Ok(None)
            }
            stage => {
                debug!(stage, "Ignoring key-exchange stage");
                Ok(None)
            }
        }
    }

    /// Stage 2: the peer's ephemeral public key plus its fingerprint of
    /// the secret it derived. Agreement must reproduce that fingerprint
    /// exactly; a mismatch means the exchange was tampered with or
    /// corrupted, and nothing may be persisted or sent.
    fn on_key_exchange_counter_offer(
        &mut self,
        keyex: &KeyExchangePayload,
    ) -> Result<Option<Envelope>> {
        self.engine.derive_shared_secret(&keyex.public_key)?;
        let local_fingerprint = self.engine.fingerprint()?;

        if local_fingerprint != keyex.fingerprint {
            warn!(
                local = local_fingerprint,
                peer = keyex.fingerprint,
                "Fingerprint mismatch, aborting key exchange"
            );
            self.notify_error(&format!(
                "Handshake failed: fingerprint mismatch (local {local_fingerprint}, peer {})",
                keyex.fingerprint
            ));
            return Ok(None);
        }

        // Both sides derived the same secret; safe to persist now
        let secret = self
            .engine
            .shared_secret()
            .ok_or(skylark_crypto::CryptoError::NotReady("shared secret not derived"))?
            .to_vec();
        self.store.save(local_fingerprint, &secret)?;
        info!(fingerprint = local_fingerprint, "Key exchange verified and persisted");

        let token = self
            .engine
            .encrypt(Timestamp::now().to_string().as_bytes())?;
        Ok(Some(Envelope::new(Payload::KeyExchange(
            KeyExchangePayload {
                stage: 3,
                fingerprint: local_fingerprint,
                rsa_fingerprint: 0,
                public_key: Vec::new(),
                encrypted_payload: token,
                encryption_algorithm: ENCRYPTION_ALGORITHM.to_string(),
                status: ExchangeStatus::Ready,
            },
        ))))
    }

    fn on_user_op_result(&mut self, result: &UserOperationResult) -> Result<Option<Envelope>> {
        match result.operation {
            UserOperation::Login => {
                if result.result != OpResult::Ok {
                    warn!("Login rejected");
                    self.set_state(ClientState::WaitLogin, Some(ClientState::LoginFail));
                    return Ok(None);
                }
                self.user_info = result.users.first().cloned();

                match result.status {
                    OpStatus::LoginOk => {
                        info!("Login succeeded");
                        self.set_state(ClientState::Ready, Some(ClientState::LoginOk));
                    }
                    OpStatus::WaitCode => {
                        info!("Login pending verification code");
                        self.set_state(ClientState::Logining, Some(ClientState::WaitCode));
                    }
                    OpStatus::NeedLogin | OpStatus::Unknown => {
                        debug!(status = ?result.status, "Ignoring login status");
                    }
                }
            }
            UserOperation::RegisterUser => match result.status {
                OpStatus::LoginOk => {
                    info!("Registration complete, logged in");
                    self.set_state(ClientState::Ready, Some(ClientState::LoginOk));
                }
                OpStatus::WaitCode => {
                    info!("Registration pending verification code");
                    self.set_state(ClientState::Registering, Some(ClientState::WaitCode));
                }
                OpStatus::NeedLogin => {
                    info!("Registered, login required");
                    self.set_state(ClientState::WaitLogin, Some(ClientState::RegisterOk));
                }
                OpStatus::Unknown => {
                    debug!("Ignoring registration status");
                }
            },
            UserOperation::Unknown => {
                debug!("Ignoring unknown user operation result");
            }
        }
        Ok(None)
    }

    /// Server-reported errors are surfaced to the listener but do not
    /// themselves change the session state.
    fn on_server_error(&mut self, error: &ErrorPayload) -> Result<Option<Envelope>> {
        warn!(message = %error.message, "Server reported error");
        self.events.on_error(&error.message);
        Ok(None)
    }

    /// Build a login request for the given identity mode.
    pub fn login(&self, mode: LoginMode, identifier: &str, password: &str) -> Envelope {
        self.user_operation(UserOperation::Login, mode, identifier, password)
    }

    /// Build a registration request for the given identity mode.
    pub fn register(&self, mode: LoginMode, identifier: &str, password: &str) -> Envelope {
        self.user_operation(UserOperation::RegisterUser, mode, identifier, password)
    }

    fn user_operation(
        &self,
        operation: UserOperation,
        mode: LoginMode,
        identifier: &str,
        password: &str,
    ) -> Envelope {
        let user = match mode {
            LoginMode::Phone => UserInfo::with_phone(identifier),
            LoginMode::Email => UserInfo::with_email(identifier),
            LoginMode::UserId => UserInfo::with_user_id(identifier, password),
        };
        let mut params = BTreeMap::new();
        params.insert("loginmode".to_string(), mode.as_str().to_string());

        Envelope::new(Payload::UserOperation(UserOperationRequest {
            operation,
            user,
            params,
        }))
    }
}
