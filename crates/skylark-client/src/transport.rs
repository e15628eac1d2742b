//! Transport boundary
//!
//! The client treats the transport as an external collaborator that
//! delivers opaque binary frames in order over a reliable connection.
//! Framing, TLS, and reconnection policy all live behind this boundary;
//! the session never inspects them.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("Connect failed: {0}")]
    Connect(String),

    /// Frame could not be sent.
    #[error("Send failed: {0}")]
    Send(String),

    /// Receiving failed mid-session.
    #[error("Receive failed: {0}")]
    Receive(String),
}

/// Establishes connections to the remote peer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect and return the established connection.
    async fn connect(&self) -> Result<Arc<dyn Connection>, TransportError>;
}

/// One established, bidirectional frame pipe.
///
/// Methods take `&self` so a receive in flight never blocks a concurrent
/// send; implementations handle their own interior synchronization.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Send one opaque frame.
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Receive the next frame; `None` means the peer closed the
    /// connection.
    async fn receive(&self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Close the connection. Idempotent.
    async fn close(&self);
}
