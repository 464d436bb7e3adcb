//! HTTP boundary with the data/solver backend.

/// Async client for the data and solve endpoints.
pub mod client;
/// Request and response payloads.
pub mod wire;

use thiserror::Error;

pub use client::SolverClient;
pub use wire::SolveRequest;

/// Failures talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    /// Connection, timeout or body transfer failure.
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Endpoint that was called.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The backend answered with a non-success status.
    #[error("{url} returned {status}")]
    Status {
        /// Endpoint that was called.
        url: String,
        /// Status code received.
        status: reqwest::StatusCode,
    },
    /// The body did not match the expected shape.
    #[error("malformed response from {url}: {source}")]
    Decode {
        /// Endpoint that was called.
        url: String,
        /// Parse failure.
        #[source]
        source: serde_json::Error,
    },
}
