//! Envelope codec boundary
//!
//! The transport delivers opaque byte frames; a [`Codec`] turns them into
//! typed [`Envelope`]s and back. [`JsonCodec`] is the default
//! implementation; deployments with a different wire encoding implement
//! the trait themselves.

use thiserror::Error;

use crate::envelope::Envelope;

/// Errors from encoding or decoding an envelope.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Envelope could not be serialized.
    #[error("Encode failed: {0}")]
    Encode(String),

    /// Frame could not be parsed as an envelope.
    #[error("Decode failed: {0}")]
    Decode(String),
}

/// Serializes envelopes to and from opaque transport frames.
pub trait Codec: Send + Sync {
    /// Encode an envelope into a transport frame.
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, CodecError>;

    /// Decode a transport frame into an envelope.
    fn decode(&self, bytes: &[u8]) -> Result<Envelope, CodecError>;
}

/// JSON envelope codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    pub fn new() -> Self {
        Self
    }
}

impl Codec for JsonCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(envelope).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Envelope, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}
