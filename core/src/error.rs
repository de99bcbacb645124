//! Error types for the Challonge API client.
//!
//! # Design
//! Construction-time failures (`Config`) are separated from per-call failures
//! so callers can distinguish "fix your environment" from "the service said
//! no." `Remote` carries a pre-formatted message because the service's error
//! envelope differs by HTTP method; the transport owns that formatting.

use std::fmt;

/// Errors returned by the Challonge client.
#[derive(Debug)]
pub enum ApiError {
    /// Missing credentials or an unresolvable timezone at construction.
    Config(String),

    /// The service returned a non-200 status. The message is built from the
    /// response according to the method-specific rules in the transport.
    Remote(String),

    /// A client-side guard rejected the call before any network I/O.
    Validation(String),

    /// The call supplied a `subdomain`, which the v1 surface does not support
    /// through this client. No network call was attempted.
    Unsupported(String),

    /// The HTTP round trip itself failed (connect, read, TLS).
    Http(String),

    /// The response body was not the JSON shape the client expected.
    Decode(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Config(msg) => write!(f, "configuration error: {msg}"),
            ApiError::Remote(msg) => write!(f, "{msg}"),
            ApiError::Validation(msg) => write!(f, "{msg}"),
            ApiError::Unsupported(msg) => {
                write!(f, "not supported against the v1 API: {msg}")
            }
            ApiError::Http(msg) => write!(f, "HTTP transport error: {msg}"),
            ApiError::Decode(msg) => write!(f, "could not decode response: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}
