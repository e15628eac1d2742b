//! # Skylark Client
//!
//! Client endpoint for the Skylark session protocol: negotiates a fresh
//! or cached encryption key with the server, authenticates a user over
//! the secured channel, and surfaces session lifecycle events to the
//! application.
//!
//! The protocol core is the [`Session`] state machine together with the
//! key-exchange engine it drives (`skylark-crypto`); [`Client`] wires
//! them to pluggable [`Transport`] and [`Codec`](skylark_core::Codec)
//! collaborators.
//!
//! ## Usage sketch
//!
//! ```ignore
//! let client = Client::new(
//!     ClientConfig::with_session_name("alice"),
//!     my_transport,
//!     Arc::new(JsonCodec::new()),
//!     Box::new(my_listener),
//! )?;
//! client.start().await?;           // handshake runs to WaitLogin/Ready
//! client.login(LoginMode::Phone, "+15551234567", "").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod session;
pub mod transport;

pub use client::Client;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use events::{NullEvents, SessionEvents};
pub use session::{LoginMode, Session};
pub use transport::{Connection, Transport, TransportError};

pub use skylark_core::{ClientState, Codec, Envelope, JsonCodec, UserInfo};
