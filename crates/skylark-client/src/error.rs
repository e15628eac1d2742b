//! Error types for the Skylark client

use thiserror::Error;

use crate::transport::TransportError;
use skylark_core::CodecError;
use skylark_crypto::CryptoError;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the client and session state machine
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Transport-level failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Envelope could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Key-exchange engine failure
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Operation requires an established connection
    #[error("Not connected")]
    NotConnected,

    /// Client is already running
    #[error("Already started")]
    AlreadyStarted,
}
