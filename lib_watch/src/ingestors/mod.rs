//! # Data Ingestors Module
//!
//! Push-side ingestion. Pull-side polling lives in `core`, next to the
//! state it reconciles.
//!
//! ## Contained Modules:
//! - **`push_session`**: the StackExchange question websocket, with
//!   heartbeat echo, keepalive ping and a sticky connectivity-error flag.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// The StackExchange push websocket session.
pub mod push_session;

pub use push_session::{PushConfig, PushError, PushSession, SessionState};
