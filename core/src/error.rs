//! Error types for the generic client and the response normalizer.
//!
//! # Design
//! The client surfaces exactly three failure kinds. `Transport` covers
//! everything between handing a request to the network and holding the full
//! response body. `Decode` is reserved for non-empty bodies that are not valid
//! JSON for the requested shape; an absent body is never an error because the
//! codec substitutes a placeholder. `Configuration` fails fast before any
//! network call is attempted.

use thiserror::Error;

/// Errors returned by `ApiClient` calls, or handed to `Callback::on_error`.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connectivity or IO failure while exchanging the request.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The response body was present but could not be decoded.
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// A required binding is missing or invalid, e.g. POST without a payload.
    #[error("invalid client configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// True for network/IO failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }

    /// True when a non-empty body failed to decode.
    pub fn is_decode(&self) -> bool {
        matches!(self, ClientError::Decode(_))
    }
}

impl From<ureq::Error> for ClientError {
    fn from(err: ureq::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

/// Errors raised while normalizing a decoded gateway response.
///
/// Timestamp parse failures are deliberately absent: a bad timestamp leaves
/// the field unset instead of failing the whole result.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("field '{field}' carries a non-numeric amount: {value}")]
    InvalidAmount { field: String, value: String },

    #[error("unknown response variant '{0}'")]
    UnknownVariant(String),
}
