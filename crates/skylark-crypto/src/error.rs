//! Error types for cryptographic operations

use thiserror::Error;

/// Result type alias for cryptographic operations
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during key exchange and payload encryption
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Required key material does not exist yet
    #[error("Key material not ready: {0}")]
    NotReady(&'static str),

    /// Peer public key could not be parsed
    #[error("Invalid peer public key: {0}")]
    InvalidPeerKey(String),

    /// Input bytes violate the expected shape
    #[error("Malformed input: {0}")]
    Malformed(String),

    /// Public key could not be encoded
    #[error("Public key encoding failed: {0}")]
    Encoding(String),

    /// Key store file operation failed
    #[error("Key store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
