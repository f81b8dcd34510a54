//! JSON payload codec.
//!
//! # Design
//! Decoding goes through a single substitution step: an absent or blank body
//! is replaced by a fixed placeholder document before `serde_json` sees it.
//! "No content" and "bad content" therefore stay distinct outcomes. The first
//! decodes into a value whose semantic fields are unset, the second is a
//! `ClientError::Decode`. Response types must tolerate the placeholder, which
//! in practice means optional fields and no `deny_unknown_fields`.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ClientError;

pub const EMPTY_OBJECT_PLACEHOLDER: &str = r#"{"message":"no content"}"#;
pub const EMPTY_LIST_PLACEHOLDER: &str = r#"[{"message":"no content"}]"#;

/// Whether a response body is decoded as one value or as a list of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseShape {
    #[default]
    Single,
    List,
}

impl ResponseShape {
    pub fn placeholder(self) -> &'static str {
        match self {
            ResponseShape::Single => EMPTY_OBJECT_PLACEHOLDER,
            ResponseShape::List => EMPTY_LIST_PLACEHOLDER,
        }
    }
}

/// A decoded body in the shape that was requested.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<S> {
    Single(S),
    List(Vec<S>),
}

impl<S> Decoded<S> {
    pub fn shape(&self) -> ResponseShape {
        match self {
            Decoded::Single(_) => ResponseShape::Single,
            Decoded::List(_) => ResponseShape::List,
        }
    }

    /// The single value, or `None` when a list was decoded.
    pub fn into_single(self) -> Option<S> {
        match self {
            Decoded::Single(value) => Some(value),
            Decoded::List(_) => None,
        }
    }

    /// Every decoded value; a single value becomes a one-element list.
    pub fn into_list(self) -> Vec<S> {
        match self {
            Decoded::Single(value) => vec![value],
            Decoded::List(values) => values,
        }
    }
}

/// Decode `body` into `shape`, substituting the placeholder when it is absent
/// or blank.
pub fn decode<S: DeserializeOwned>(
    body: Option<&[u8]>,
    shape: ResponseShape,
) -> Result<Decoded<S>, ClientError> {
    let text = effective_body(body, shape);
    Ok(match shape {
        ResponseShape::Single => Decoded::Single(serde_json::from_slice(text)?),
        ResponseShape::List => Decoded::List(serde_json::from_slice(text)?),
    })
}

pub fn decode_single<S: DeserializeOwned>(body: Option<&[u8]>) -> Result<S, ClientError> {
    Ok(serde_json::from_slice(effective_body(body, ResponseShape::Single))?)
}

pub fn decode_list<S: DeserializeOwned>(body: Option<&[u8]>) -> Result<Vec<S>, ClientError> {
    Ok(serde_json::from_slice(effective_body(body, ResponseShape::List))?)
}

/// Bytes are not checked for UTF-8 here; `serde_json` reports invalid
/// sequences as decode errors.
fn effective_body(body: Option<&[u8]>, shape: ResponseShape) -> &[u8] {
    match body {
        Some(bytes) if !bytes.trim_ascii().is_empty() => bytes,
        _ => {
            log::debug!("empty response body, decoding {shape:?} placeholder");
            shape.placeholder().as_bytes()
        }
    }
}

/// Encode a value as a JSON request body.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, ClientError> {
    serde_json::to_string(value)
        .map_err(|e| ClientError::configuration(format!("request payload could not be encoded: {e}")))
}

/// Produces the JSON body of a POST request.
///
/// The client treats the result as opaque text; which fields go into it is
/// the business of the operation that builds the payload.
pub trait RequestPayload: Send + Sync {
    fn to_request_body(&self) -> Result<String, ClientError>;
}

/// Any serializable value, encoded with `serde_json`.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPayload<T>(pub T);

impl<T: Serialize + Send + Sync> RequestPayload for JsonPayload<T> {
    fn to_request_body(&self) -> Result<String, ClientError> {
        encode(&self.0)
    }
}

/// Pre-encoded JSON, sent verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawJson(pub String);

impl RawJson {
    pub fn new(json: impl Into<String>) -> Self {
        Self(json.into())
    }
}

impl RequestPayload for RawJson {
    fn to_request_body(&self) -> Result<String, ClientError> {
        Ok(self.0.clone())
    }
}

impl RequestPayload for serde_json::Value {
    fn to_request_body(&self) -> Result<String, ClientError> {
        encode(self)
    }
}
