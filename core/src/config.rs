//! Immutable client configuration and its builder.
//!
//! # Design
//! A `ClientConfig` is built once and never mutated. Reconfiguration goes
//! through `to_builder()`, which copies the current bindings into a fresh
//! builder; building it yields a new config and leaves the original intact.
//! The request payload is held behind an `Arc` so rebuilt configs share it
//! without requiring `Clone` from the payload type.

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use url::Url;

use crate::codec::{RequestPayload, ResponseShape};
use crate::error::ClientError;
use crate::http::{Header, AUTHORIZATION};

/// Everything one `ApiClient` needs to issue requests.
#[derive(Clone)]
pub struct ClientConfig {
    authorization: Option<String>,
    headers: Vec<Header>,
    base_uri: String,
    payload: Option<Arc<dyn RequestPayload>>,
    response_shape: ResponseShape,
}

impl ClientConfig {
    pub fn builder(base_uri: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            authorization: None,
            headers: Vec::new(),
            base_uri: base_uri.into(),
            payload: None,
            response_shape: ResponseShape::default(),
        }
    }

    /// A builder pre-filled with this config's bindings.
    pub fn to_builder(&self) -> ClientConfigBuilder {
        ClientConfigBuilder {
            authorization: self.authorization.clone(),
            headers: self.headers.clone(),
            base_uri: self.base_uri.clone(),
            payload: self.payload.clone(),
            response_shape: self.response_shape,
        }
    }

    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn payload(&self) -> Option<&dyn RequestPayload> {
        self.payload.as_deref()
    }

    pub fn response_shape(&self) -> ResponseShape {
        self.response_shape
    }

    /// Headers for an outgoing request: `Authorization` when bound, then the
    /// configured headers in insertion order.
    pub fn request_headers(&self) -> Vec<Header> {
        let mut headers = Vec::with_capacity(self.headers.len() + 1);
        if let Some(authorization) = &self.authorization {
            headers.push(Header::new(AUTHORIZATION, authorization.clone()));
        }
        headers.extend(self.headers.iter().cloned());
        headers
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("authorization", &self.authorization.as_ref().map(|_| "<redacted>"))
            .field("headers", &self.headers.len())
            .field("base_uri", &self.base_uri)
            .field("payload", &self.payload.is_some())
            .field("response_shape", &self.response_shape)
            .finish()
    }
}

/// Builder for [`ClientConfig`].
#[must_use]
pub struct ClientConfigBuilder {
    authorization: Option<String>,
    headers: Vec<Header>,
    base_uri: String,
    payload: Option<Arc<dyn RequestPayload>>,
    response_shape: ResponseShape,
}

impl ClientConfigBuilder {
    pub fn base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = base_uri.into();
        self
    }

    /// Raw `Authorization` header value.
    pub fn authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    pub fn basic_auth(self, user: &str, secret: &str) -> Self {
        let value = format!("Basic {}", basic_credentials(user, secret));
        self.authorization(value)
    }

    pub fn bearer_token(self, token: &str) -> Self {
        self.authorization(bearer(token))
    }

    pub fn clear_authorization(mut self) -> Self {
        self.authorization = None;
        self
    }

    /// Append one header. Duplicates are kept.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    /// Replace the header list.
    pub fn headers<I, H>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = H>,
        H: Into<Header>,
    {
        self.headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn payload(mut self, payload: impl RequestPayload + 'static) -> Self {
        self.payload = Some(Arc::new(payload));
        self
    }

    pub fn shared_payload(mut self, payload: Arc<dyn RequestPayload>) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn clear_payload(mut self) -> Self {
        self.payload = None;
        self
    }

    pub fn response_shape(mut self, shape: ResponseShape) -> Self {
        self.response_shape = shape;
        self
    }

    /// Validate the base URI and freeze the configuration.
    pub fn build(self) -> Result<ClientConfig, ClientError> {
        let trimmed = self.base_uri.trim();
        if trimmed.is_empty() {
            return Err(ClientError::configuration("base URI is empty"));
        }
        let parsed = Url::parse(trimmed)
            .map_err(|e| ClientError::configuration(format!("invalid base URI '{trimmed}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::configuration(format!(
                "unsupported scheme '{}' in base URI",
                parsed.scheme()
            )));
        }

        Ok(ClientConfig {
            authorization: self.authorization,
            headers: self.headers,
            base_uri: trimmed.trim_end_matches('/').to_string(),
            payload: self.payload,
            response_shape: self.response_shape,
        })
    }
}

/// Gateway deployment the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    Sandbox,
    Production,
}

impl Environment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Sandbox => "https://sandbox.safaricom.co.ke",
            Environment::Production => "https://api.safaricom.co.ke",
        }
    }

    /// Full URL of an endpoint path on this environment.
    pub fn endpoint(&self, path: &str) -> Result<String, ClientError> {
        build_url(&[self.base_url(), path], &[])
    }
}

/// Join URL segments with `/` and append URL-encoded query pairs.
///
/// A single trailing slash is removed from every segment before joining.
pub fn build_url(parts: &[&str], query: &[(&str, &str)]) -> Result<String, ClientError> {
    let joined = parts
        .iter()
        .map(|part| part.strip_suffix('/').unwrap_or(part))
        .collect::<Vec<_>>()
        .join("/");
    let mut url = Url::parse(&joined)
        .map_err(|e| ClientError::configuration(format!("invalid URL '{joined}': {e}")))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter().copied());
    }
    Ok(url.to_string())
}

/// Base64 of `user:secret`, the credential half of a Basic header.
pub fn basic_credentials(user: &str, secret: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(format!("{user}:{secret}"))
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
