//! REST transport for the support console
//!
//! This crate provides the HTTP plumbing the console uses to talk to the
//! support backend: request/response types, client configuration, retry
//! helpers and a reqwest-backed client. Domain endpoints live in
//! `support-core`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod rest;

pub use rest::{
    network_retry, retry, HttpMethod, RestClient, RestClientConfig, RestError, RestRequest,
    RestResponse, RetryConfig,
};

/// Result type for REST operations
pub type Result<T> = std::result::Result<T, RestError>;
