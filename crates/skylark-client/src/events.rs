//! Application-facing session event listener
//!
//! The state machine notifies a single listener synchronously: the next
//! inbound envelope is not dispatched until the callback returns, so
//! implementations must not block indefinitely.
//!
//! Callbacks run while the client's internal session lock is held. A
//! callback must not call back into `Client` methods; record the event
//! or hand it to a channel, and act on it from outside the callback.

use skylark_core::ClientState;

/// Receives session lifecycle notifications.
pub trait SessionEvents: Send {
    /// Called on every state transition, with the optional sub-state
    /// explaining how the primary state was reached.
    fn on_state_change(&mut self, state: ClientState, sub_state: Option<ClientState>) {
        let _ = (state, sub_state);
    }

    /// Called for server-reported errors and local handshake failures.
    /// Does not imply a state change.
    fn on_error(&mut self, detail: &str) {
        let _ = detail;
    }
}

/// Listener that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullEvents;

impl SessionEvents for NullEvents {}
