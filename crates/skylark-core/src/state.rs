//! Client session states
//!
//! A session holds exactly one primary [`ClientState`] at a time. Some
//! transitions carry a second `ClientState` value as advisory sub-state
//! describing how the primary state was reached (for example
//! `WaitLogin`/`LoginFail` after a rejected login).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the session is in the connection and handshake lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientState {
    // Connection lifecycle
    /// Freshly constructed, not yet connected.
    Initial,
    /// Transport is not connected.
    Disconnected,
    /// Transport connect in progress.
    Connecting,
    /// Transport connected, handshake not yet started.
    Connected,
    /// Transport dropped mid-session.
    ConnectionLost,
    /// Orderly shutdown in progress.
    Closing,
    /// Session closed.
    Closed,
    /// Process is exiting.
    Exiting,

    // Protocol progress
    /// Hello sent, waiting for the server's stage directive.
    Hello,
    /// Key exchange in progress.
    KeyExchange,
    /// Server requires login or registration.
    WaitLogin,
    /// Registration in progress.
    Registering,
    /// Login in progress.
    Logining,
    /// Secured and authenticated; data may flow.
    Ready,

    // Outcomes, used as sub-state
    /// Login was rejected.
    LoginFail,
    /// A verification code step is pending.
    WaitCode,
    /// Login succeeded.
    LoginOk,
    /// Registration succeeded.
    RegisterOk,
    /// Fatal error.
    Error,
}

impl ClientState {
    /// True while the hello/key-exchange handshake is still in flight.
    ///
    /// The client driver bounds the wait for the next inbound envelope
    /// only while this holds.
    pub fn in_handshake(&self) -> bool {
        matches!(self, ClientState::Hello | ClientState::KeyExchange)
    }

    /// True once the session is secured and authenticated.
    pub fn is_ready(&self) -> bool {
        matches!(self, ClientState::Ready)
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
