//! # Data Retrieval Module
//!
//! Generic HTTP plumbing shared by the API-specific clients: request
//! building, retries and response capture. The StackExchange client on top
//! only deals with envelopes and domain records.
//!
//! ## Contained Modules:
//!
//! - **`ky_http`**: A generic HTTP `ApiClient` built on `reqwest` and
//!   `reqwest-middleware`, featuring automatic retries with exponential
//!   backoff.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Generic HTTP API client with retry middleware for resilient network requests.
pub mod ky_http;
