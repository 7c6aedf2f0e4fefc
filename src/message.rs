//! Received and control messages.

use crate::enums::MessageType;
use std::borrow::Cow;
use std::collections::HashMap;

/// Message body: text for structured formats, raw bytes for binary transports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    /// Text view of the payload. Bytes are decoded as lossy UTF-8.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Payload::Text(s) => Cow::Borrowed(s),
            Payload::Binary(b) => String::from_utf8_lossy(b),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Text(s) => s.is_empty(),
            Payload::Binary(b) => b.is_empty(),
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Text(String::new())
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Payload::Binary(value)
    }
}

/// A message exchanged with the system under test.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    pub payload: Payload,
    pub headers: HashMap<String, String>,
    /// Declared message type tag such as `"JSON"`; `None` when undeclared.
    pub message_type: Option<String>,
}

impl Message {
    pub fn new(payload: impl Into<Payload>) -> Self {
        Message {
            payload: payload.into(),
            headers: HashMap::new(),
            message_type: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_type(mut self, message_type: impl Into<String>) -> Self {
        self.message_type = Some(message_type.into());
        self
    }

    pub fn payload_text(&self) -> Cow<'_, str> {
        self.payload.as_text()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// The declared type parsed as a well-known [`MessageType`].
    pub fn known_type(&self) -> Option<MessageType> {
        self.message_type.as_deref()?.parse().ok()
    }

    /// Payload looks like a JSON object or array.
    pub fn has_json_payload(&self) -> bool {
        let text = self.payload_text();
        let trimmed = text.trim_start();
        trimmed.starts_with('{') || trimmed.starts_with('[')
    }

    /// Payload looks like an XML document.
    pub fn has_xml_payload(&self) -> bool {
        self.payload_text().trim_start().starts_with('<')
    }
}
