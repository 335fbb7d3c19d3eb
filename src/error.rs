//! Error taxonomy shared by every part of the crate.
//!
//! Request-layer failures (`Connection`, `Timeout`, `Api`, `RateLimit`, `NotFound`,
//! `Decode`) are raised by the HTTP clients; `Dimension` and `Validation` are raised
//! before any network call; `Processing` covers normalization and export.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The server could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The request did not complete within the configured timeout.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// The server answered with a non-success status (other than 404/429).
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The response body could not be decoded in the expected format.
    #[error("invalid {format} response: {message}")]
    Decode {
        format: &'static str,
        message: String,
    },

    #[error("invalid indicator: {0}")]
    InvalidIndicator(String),

    /// A dimension filter names an unknown key or value.
    #[error("dimension error: {0}")]
    Dimension(String),

    #[error("data processing error: {0}")]
    Processing(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    /// True for failures raised while talking to the API.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Error::Connection(_)
                | Error::Timeout(_)
                | Error::Api { .. }
                | Error::RateLimit(_)
                | Error::NotFound(_)
                | Error::Decode { .. }
        )
    }

    /// HTTP status associated with the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::RateLimit(_) => Some(429),
            Error::NotFound(_) => Some(404),
            _ => None,
        }
    }

    pub(crate) fn processing(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        Error::Processing(format!("{context}: {err}"))
    }
}
