//! # StackExchange Module
//!
//! Everything that knows about the StackExchange API: wire models, the
//! REST client and the query trait the pollers are written against.
//!
//! ## Contained Modules:
//!
//! - **`model`**: questions, response envelopes, tag wikis, sites and socket frames.
//! - **`apicall`**: `StackExchangeApi`, the REST client.
//! - **`source`**: `QuestionSource`, the seam between pollers and the client.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// REST client for the StackExchange API.
pub mod apicall;
/// Wire models.
pub mod model;
/// Query trait implemented by the REST client.
pub mod source;

pub use apicall::{RemoteError, StackExchangeApi, MAX_BATCH};
pub use model::{NewQuestionMessage, Question};
pub use source::QuestionSource;
