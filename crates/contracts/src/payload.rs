//! Payload - serialized wire form of a document

use bytes::Bytes;
use serde::Serialize;

/// JSON content type used for every document payload
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Serialized document ready to be handed to a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    body: Bytes,
    content_type: &'static str,
}

impl Payload {
    /// Encode a document as JSON
    ///
    /// Deterministic: identical input always yields identical bytes.
    pub fn json<T: Serialize + ?Sized>(document: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(document)?;
        Ok(Self {
            body: Bytes::from(body),
            content_type: JSON_CONTENT_TYPE,
        })
    }

    /// Wrap pre-encoded bytes
    pub fn from_bytes(body: impl Into<Bytes>, content_type: &'static str) -> Self {
        Self {
            body: body.into(),
            content_type,
        }
    }

    /// Encoded body
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// MIME type of the body
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// Body length in bytes
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Whether the body is empty
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}
