//! Generic typed HTTP client with an M-Pesa response normalizer.
//!
//! # Overview
//! `ApiClient<S>` issues GET/POST requests against a bound `ClientConfig`
//! and decodes the reply into `S` or `Vec<S>`, either blocking or by handing
//! the outcome to a `Callback` on a pooled worker. The gateway layer decodes
//! replies and webhook callbacks into `MpesaResponse` and reduces them to a
//! canonical `NormalizedResult`.
//!
//! # Design
//! - The transport is a trait; `UreqTransport` is the default.
//! - Empty bodies decode through a placeholder, so absence of content is
//!   never an error, while malformed content always is.
//! - Normalization is a pure dispatch over an explicit set of variants.

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod normalizer;
pub mod reply;
pub mod transport;
pub mod types;

pub use client::{ApiClient, Callback};
pub use codec::{Decoded, JsonPayload, RawJson, RequestPayload, ResponseShape};
pub use config::{ClientConfig, ClientConfigBuilder, Environment};
pub use error::{ClientError, NormalizeError};
pub use http::{Header, HttpMethod, HttpRequest, HttpResponse};
pub use normalizer::{normalize, NormalizedResult, ResponseVariant};
pub use reply::{evaluate, ReplyKind, ResponseStatus, ResultDesc, ValidationReply};
pub use transport::{Transport, UreqTransport};
pub use types::MpesaResponse;
