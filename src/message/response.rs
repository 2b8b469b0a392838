//! Reply documents, including synthetic transmit-failure replies.

use crate::error::{ProtocolError, Result};
use crate::message::document::Document;
use crate::message::TRANSMIT_ERROR_KEY;
use serde_json::Value;

/// A response document: key-value pairs plus a boolean `"success"`.
///
/// `"success"` is reserved and only settable through
/// [`set_success`](Self::set_success); a missing `"success"` reads as
/// `false`.
#[derive(Debug, Clone, Default)]
pub struct ResponseMessage {
    document: Document,
}

impl ResponseMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a response body received off the wire.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self {
            document: Document::from_json(json)?,
        })
    }

    /// Add a key-value pair. The `"success"` key is reserved; use
    /// [`set_success`](Self::set_success) instead.
    pub fn put(mut self, key: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key == "success" {
            return Err(ProtocolError::ReservedKey(key));
        }
        self.document.insert(key, Value::String(value.into()));
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.document.get_str(key)
    }

    pub fn set_success(mut self, success: bool) -> Self {
        self.document.insert("success", Value::Bool(success));
        self
    }

    pub fn success(&self) -> bool {
        self.document.get_bool("success").unwrap_or(false)
    }

    /// Absorb keys from `other` that this message does not already have.
    pub fn merge(mut self, other: &ResponseMessage) -> Self {
        self.document.absorb(&other.document);
        self
    }

    /// Drop every key-value pair.
    pub fn clear(mut self) -> Self {
        self.document.clear();
        self
    }

    pub fn json(&self) -> String {
        self.document.json()
    }

    /// Failure stage tag, when this is a synthetic transmit-failure reply.
    pub fn transmit_error(&self) -> Option<String> {
        self.document.get_str(TRANSMIT_ERROR_KEY)
    }

    /// Build the synthetic reply a failed send resolves to. Carries the
    /// failing stage under `TRANSMIT_ERROR`, plus the raw reply text under
    /// `"body"` when the failure was an unparseable reply.
    pub(crate) fn transmit_failure(tag: &str, raw_body: Option<String>) -> Self {
        let mut document = Document::new();
        document.insert(TRANSMIT_ERROR_KEY, Value::String(tag.into()));
        if tag == "INVALID_JSON" {
            if let Some(body) = raw_body {
                document.insert("body", Value::String(body));
            }
        }
        Self { document }
    }
}
