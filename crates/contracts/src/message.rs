//! Message model - the minimal carrier contract the engine routes
//!
//! The engine reads a routing header and carries the payload; it never
//! retains a message beyond a single dispatch call.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message body
///
/// Opaque to the engine; transports interpret it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Body {
    /// No payload
    #[default]
    Empty,
    /// Text payload
    Text(String),
    /// Binary payload
    Bytes(Bytes),
    /// Structured payload
    Json(Value),
}

impl Body {
    /// Whether the body carries no payload
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Text payload, if this body is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// In-flight message: mutable header map + body
///
/// Header insertion order is irrelevant; keys are compared verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    headers: HashMap<String, Value>,
    body: Body,
}

impl Message {
    /// Create an empty message
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a message with the given body
    pub fn with_body(body: Body) -> Self {
        Self {
            headers: HashMap::new(),
            body,
        }
    }

    /// Read a header value
    pub fn header(&self, name: &str) -> Option<&Value> {
        self.headers.get(name)
    }

    /// Read a header value as a string slice
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(Value::as_str)
    }

    /// Set a header value, replacing any previous one
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.headers.insert(name.into(), value.into());
    }

    /// Remove a header, returning its previous value
    pub fn remove_header(&mut self, name: &str) -> Option<Value> {
        self.headers.remove(name)
    }

    /// All headers
    pub fn headers(&self) -> &HashMap<String, Value> {
        &self.headers
    }

    /// Message body
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Mutable message body
    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// Replace the body
    pub fn set_body(&mut self, body: Body) {
        self.body = body;
    }
}
