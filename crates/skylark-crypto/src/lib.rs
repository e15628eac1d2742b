//! # Skylark Crypto
//!
//! The key-exchange engine behind a Skylark session: P-256 ECDH agreement,
//! the 64-bit fingerprint both peers compare to confirm they derived the
//! same secret, AES-256-CTR encryption of opaque payloads, and persistence
//! of the agreed key material across process restarts.
//!
//! The engine has no protocol awareness; the session state machine in
//! `skylark-client` drives it.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod error;
pub mod exchange;
pub mod store;

pub use error::{CryptoError, Result};
pub use exchange::KeyExchange;
pub use store::{CachedKey, KeyStore};

/// Length in bytes of the IV prepended to every ciphertext.
pub const IV_LEN: usize = 16;

/// Number of leading shared-secret bytes folded into the fingerprint.
pub const FINGERPRINT_LEN: usize = 8;

/// Length in bytes of the agreed shared secret (P-256 field element),
/// which keys AES-256 directly.
pub const SECRET_LEN: usize = 32;
