//! Client driver
//!
//! Glues the session state machine to the transport and codec
//! collaborators: connects, emits the opening hello, then runs a single
//! serialized inbound loop. One envelope is decoded, dispatched, and its
//! reply sent before the next frame is considered, so the session and
//! key material never see concurrent mutation.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use skylark_core::{ClientState, Codec, UserInfo};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::events::SessionEvents;
use crate::session::{LoginMode, Session};
use crate::transport::{Connection, Transport, TransportError};

/// Outcome of waiting for the next inbound frame.
enum Inbound {
    Frame(Vec<u8>),
    Closed,
    Failed(TransportError),
    TimedOut,
}

/// The Skylark protocol client: one session over one transport
/// connection.
pub struct Client {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    codec: Arc<dyn Codec>,
    session: Arc<Mutex<Session>>,
    connection: Mutex<Option<Arc<dyn Connection>>>,
    stop_tx: watch::Sender<bool>,
}

impl Client {
    /// Create a client. Cached key material for the configured session
    /// identity is loaded here; the transport is not touched until
    /// [`Client::start`].
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        codec: Arc<dyn Codec>,
        events: Box<dyn SessionEvents>,
    ) -> Result<Self> {
        config.validate().map_err(ClientError::Config)?;
        let session = Session::new(config.clone(), events);
        let (stop_tx, _) = watch::channel(false);
        Ok(Self {
            config,
            transport,
            codec,
            session: Arc::new(Mutex::new(session)),
            connection: Mutex::new(None),
            stop_tx,
        })
    }

    /// Current session state.
    pub fn state(&self) -> ClientState {
        self.session.lock().state()
    }

    /// Authenticated user, if a login has succeeded.
    pub fn user_info(&self) -> Option<UserInfo> {
        self.session.lock().user_info().cloned()
    }

    /// Connect, send the opening hello, and run the inbound dispatch
    /// loop until the connection ends or [`Client::stop`] is called.
    ///
    /// The caller owns reconnection policy; this method does not retry.
    pub async fn start(&self) -> Result<()> {
        if self.connection.lock().is_some() {
            return Err(ClientError::AlreadyStarted);
        }

        info!(session = %self.config.session_name, "Connecting");
        self.stop_tx.send_replace(false);
        self.session.lock().set_state(ClientState::Connecting, None);

        let connection = match self.transport.connect().await {
            Ok(connection) => connection,
            Err(e) => {
                warn!(error = %e, "Connect failed");
                self.session.lock().set_state(ClientState::Disconnected, None);
                return Err(e.into());
            }
        };
        *self.connection.lock() = Some(connection.clone());
        self.session.lock().set_state(ClientState::Connected, None);

        let result = self.drive(connection.clone()).await;
        connection.close().await;
        *self.connection.lock() = None;
        result
    }

    /// Signal the running session to stop. The transport closes and
    /// further listener callbacks are suppressed. A stop without an
    /// active connection is a no-op.
    pub fn stop(&self) {
        if self.connection.lock().is_none() {
            debug!("Stop without an active connection, ignoring");
            return;
        }
        info!("Stopping client");
        self.session.lock().set_state(ClientState::Closing, None);
        let _ = self.stop_tx.send(true);
    }

    /// Send a login request. Valid once the server has asked for login
    /// (`WaitLogin`); the server answers with a `UserOperationResult`.
    pub async fn login(&self, mode: LoginMode, identifier: &str, password: &str) -> Result<()> {
        let envelope = self.session.lock().login(mode, identifier, password);
        self.send(&envelope).await
    }

    /// Send a registration request.
    pub async fn register(&self, mode: LoginMode, identifier: &str, password: &str) -> Result<()> {
        let envelope = self.session.lock().register(mode, identifier, password);
        self.send(&envelope).await
    }

    async fn send(&self, envelope: &skylark_core::Envelope) -> Result<()> {
        let connection = self
            .connection
            .lock()
            .clone()
            .ok_or(ClientError::NotConnected)?;
        connection.send(&self.codec.encode(envelope)?).await?;
        Ok(())
    }

    /// Emit the opening hello, then run the inbound loop. Every exit,
    /// including a failed hello, returns through the cleanup in
    /// [`Client::start`].
    async fn drive(&self, connection: Arc<dyn Connection>) -> Result<()> {
        let hello = self.session.lock().on_connect()?;
        connection.send(&self.codec.encode(&hello)?).await?;
        self.run(connection).await
    }

    async fn run(&self, connection: Arc<dyn Connection>) -> Result<()> {
        let mut stop_rx = self.stop_tx.subscribe();

        loop {
            if *stop_rx.borrow() {
                break;
            }

            // The handshake is the only phase with a bounded wait; once
            // the session is past it the server is allowed to go quiet.
            let timeout = self
                .session
                .lock()
                .state()
                .in_handshake()
                .then(|| self.config.handshake_timeout());

            let inbound = tokio::select! {
                _ = stop_rx.changed() => break,
                inbound = next_frame(connection.as_ref(), timeout) => inbound,
            };

            match inbound {
                Inbound::Frame(bytes) => {
                    let reply = {
                        let mut session = self.session.lock();
                        match self.codec.decode(&bytes) {
                            Ok(envelope) => match session.handle(&envelope) {
                                Ok(reply) => reply,
                                Err(e) => {
                                    // Fatal to this operation only; the
                                    // session keeps running
                                    warn!(error = %e, "Dispatch failed");
                                    session.notify_error(&e.to_string());
                                    None
                                }
                            },
                            Err(e) => {
                                debug!(error = %e, "Dropping undecodable frame");
                                None
                            }
                        }
                    };
                    if let Some(reply) = reply {
                        connection.send(&self.codec.encode(&reply)?).await?;
                    }
                }
                Inbound::Closed => {
                    warn!("Connection closed by peer");
                    self.session
                        .lock()
                        .set_state(ClientState::ConnectionLost, None);
                    return Ok(());
                }
                Inbound::Failed(e) => {
                    warn!(error = %e, "Transport receive failed");
                    self.session
                        .lock()
                        .set_state(ClientState::ConnectionLost, None);
                    return Err(e.into());
                }
                Inbound::TimedOut => {
                    warn!(
                        timeout_secs = self.config.handshake_timeout_secs,
                        "Handshake stage timed out"
                    );
                    let mut session = self.session.lock();
                    session.notify_error("Handshake timed out");
                    session.set_state(ClientState::ConnectionLost, Some(ClientState::Error));
                    return Ok(());
                }
            }
        }

        // Caller-initiated stop: close quietly, no further callbacks
        self.session.lock().finish_close();
        Ok(())
    }
}

async fn next_frame(connection: &dyn Connection, timeout: Option<Duration>) -> Inbound {
    let received = match timeout {
        Some(timeout) => match tokio::time::timeout(timeout, connection.receive()).await {
            Ok(received) => received,
            Err(_) => return Inbound::TimedOut,
        },
        None => connection.receive().await,
    };
    match received {
        Ok(Some(frame)) => Inbound::Frame(frame),
        Ok(None) => Inbound::Closed,
        Err(e) => Inbound::Failed(e),
    }
}
