//! # Skylark Core
//!
//! Wire-level data model for the Skylark session protocol: the message
//! envelope and its payload variants, the client state enumeration, and the
//! codec boundary used to move envelopes over an opaque binary transport.
//!
//! The crate is protocol-only; it performs no I/O and holds no key material.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod codec;
pub mod envelope;
pub mod state;
pub mod types;

pub use codec::{Codec, CodecError, JsonCodec};
pub use envelope::{
    Envelope, ErrorPayload, ExchangeStatus, HelloPayload, HelloStage, KeyExchangePayload,
    MessageType, OpResult, OpStatus, Payload, UserOperation, UserOperationRequest,
    UserOperationResult,
};
pub use state::ClientState;
pub use types::{Timestamp, UserInfo};

/// Protocol version carried in every outbound envelope.
pub const PROTOCOL_VERSION: u32 = 1;

/// Length in bytes of the IV prepended to every ciphertext.
pub const IV_LEN: usize = 16;

/// Label for the symmetric algorithm negotiated during key exchange.
pub const ENCRYPTION_ALGORITHM: &str = "AES-CTR";
