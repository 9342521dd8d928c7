//! Values that flow between a binder and its handler.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::message::{Message, MessageHeaders};

/// One bound handler argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// The message payload.
    Payload(Value),
    /// A single header; `None` when an optional header is missing.
    Header(Option<Value>),
    /// The whole header set.
    Headers(MessageHeaders),
    /// The string-valued subset of the header set.
    Properties(BTreeMap<String, String>),
    /// The message itself.
    Message(Message),
}

impl Argument {
    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Payload(_) => "payload",
            Self::Header(_) => "header",
            Self::Headers(_) => "headers",
            Self::Properties(_) => "properties",
            Self::Message(_) => "message",
        }
    }

    pub fn as_payload(&self) -> Option<&Value> {
        match self {
            Self::Payload(value) => Some(value),
            _ => None,
        }
    }

    /// The header value, if this is a header argument and the header was present.
    pub fn as_header(&self) -> Option<&Value> {
        match self {
            Self::Header(value) => value.as_ref(),
            _ => None,
        }
    }

    pub fn as_headers(&self) -> Option<&MessageHeaders> {
        match self {
            Self::Headers(headers) => Some(headers),
            _ => None,
        }
    }

    pub fn as_properties(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::Properties(properties) => Some(properties),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Self::Message(message) => Some(message),
            _ => None,
        }
    }
}

/// What a handler hands back: a bare payload or a complete message.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Payload(Value),
    Message(Message),
}

impl From<Value> for Outbound {
    fn from(value: Value) -> Self {
        Self::Payload(value)
    }
}

impl From<Message> for Outbound {
    fn from(message: Message) -> Self {
        Self::Message(message)
    }
}
