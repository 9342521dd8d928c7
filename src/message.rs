//! Immutable messages and the builder used to derive new ones.
//!
//! A [`Message`] is a payload plus a set of headers. Once built neither can
//! change; handlers that want to "modify" a message build a new one through
//! [`MessageBuilder::from_message`] and the header copy rules.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::MessageError;

// ── Headers ─────────────────────────────────────────────────────────

/// Read-only header map shared between clones of a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageHeaders(Arc<BTreeMap<String, Value>>);

impl MessageHeaders {
    pub fn new(headers: BTreeMap<String, Value>) -> Self {
        Self(Arc::new(headers))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Only the entries whose value is a JSON string.
    pub fn string_values(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .filter_map(|(key, value)| value.as_str().map(|s| (key.clone(), s.to_string())))
            .collect()
    }

    /// Copy the headers out into an owned map.
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.0.as_ref().clone()
    }

    /// True if every entry of `other` is present here with an equal value.
    pub fn contains_all(&self, other: &MessageHeaders) -> bool {
        other
            .iter()
            .all(|(key, value)| self.get(key) == Some(value))
    }
}

impl FromIterator<(String, Value)> for MessageHeaders {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, Value>> for MessageHeaders {
    fn from(headers: BTreeMap<String, Value>) -> Self {
        Self::new(headers)
    }
}

// ── Message ─────────────────────────────────────────────────────────

/// Immutable payload + headers envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: Uuid,
    timestamp: DateTime<Utc>,
    payload: Value,
    #[serde(default)]
    headers: MessageHeaders,
}

impl Message {
    /// Build a message with no headers.
    pub fn new(payload: impl Into<Value>) -> Result<Self, MessageError> {
        MessageBuilder::with_payload(payload).build()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn headers(&self) -> &MessageHeaders {
        &self.headers
    }

    /// Shorthand for `headers().get(key)`.
    pub fn header(&self, key: &str) -> Option<&Value> {
        self.headers.get(key)
    }
}

// ── Builder ─────────────────────────────────────────────────────────

/// Builds new messages. Every built message gets a fresh id and timestamp.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    payload: Value,
    headers: BTreeMap<String, Value>,
}

impl MessageBuilder {
    /// Start a message from a payload.
    pub fn with_payload(payload: impl Into<Value>) -> Self {
        Self {
            payload: payload.into(),
            headers: BTreeMap::new(),
        }
    }

    /// Start from an existing message, keeping its payload and headers.
    pub fn from_message(message: &Message) -> Self {
        Self {
            payload: message.payload.clone(),
            headers: message.headers.to_map(),
        }
    }

    /// Set a single header, replacing any previous value.
    pub fn set_header(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn remove_header(mut self, key: &str) -> Self {
        self.headers.remove(key);
        self
    }

    /// Copy headers, overwriting keys that are already set.
    pub fn copy_headers<I>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        self.copy_headers_with(headers, true)
    }

    /// Copy headers, leaving keys that are already set untouched.
    pub fn copy_headers_if_absent<I>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        self.copy_headers_with(headers, false)
    }

    pub fn copy_headers_with<I>(mut self, headers: I, overwrite: bool) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (key, value) in headers {
            if overwrite || !self.headers.contains_key(&key) {
                self.headers.insert(key, value);
            }
        }
        self
    }

    pub fn build(self) -> Result<Message, MessageError> {
        if self.payload.is_null() {
            return Err(MessageError::NullPayload);
        }
        Ok(Message {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload: self.payload,
            headers: MessageHeaders::new(self.headers),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn build_rejects_null_payload() {
        let result = MessageBuilder::with_payload(Value::Null).build();
        assert!(matches!(result, Err(MessageError::NullPayload)));
    }

    #[test]
    fn copy_headers_overwrites() {
        let msg = MessageBuilder::with_payload("p")
            .set_header("a", 1)
            .copy_headers(headers(&[("a", json!(2)), ("b", json!(3))]))
            .build()
            .unwrap();
        assert_eq!(msg.header("a"), Some(&json!(2)));
        assert_eq!(msg.header("b"), Some(&json!(3)));
    }

    #[test]
    fn copy_headers_if_absent_keeps_existing() {
        let msg = MessageBuilder::with_payload("p")
            .set_header("a", 1)
            .copy_headers_if_absent(headers(&[("a", json!(2)), ("b", json!(3))]))
            .build()
            .unwrap();
        assert_eq!(msg.header("a"), Some(&json!(1)));
        assert_eq!(msg.header("b"), Some(&json!(3)));
    }

    #[test]
    fn remove_header_drops_only_that_key() {
        let original = MessageBuilder::with_payload("p")
            .set_header("keep", 1)
            .set_header("drop", 2)
            .build()
            .unwrap();
        let trimmed = MessageBuilder::from_message(&original)
            .remove_header("drop")
            .remove_header("never-set")
            .build()
            .unwrap();
        assert_eq!(trimmed.header("keep"), Some(&json!(1)));
        assert!(!trimmed.headers().contains_key("drop"));
        assert!(original.headers().contains_key("drop"));
    }

    #[test]
    fn from_message_gets_fresh_identity() {
        let original = MessageBuilder::with_payload("order-42")
            .set_header("id", "abc")
            .build()
            .unwrap();
        let derived = MessageBuilder::from_message(&original).build().unwrap();
        assert_ne!(original.id(), derived.id());
        assert_eq!(derived.payload(), original.payload());
        assert_eq!(derived.headers(), original.headers());
    }

    #[test]
    fn clones_share_headers() {
        let msg = MessageBuilder::with_payload(1).set_header("k", "v").build().unwrap();
        let clone = msg.clone();
        assert!(Arc::ptr_eq(&msg.headers().0, &clone.headers().0));
    }

    #[test]
    fn string_values_filters_non_strings() {
        let msg = MessageBuilder::with_payload(1)
            .set_header("s", "text")
            .set_header("n", 5)
            .set_header("b", true)
            .build()
            .unwrap();
        let strings = msg.headers().string_values();
        assert_eq!(strings.len(), 1);
        assert_eq!(strings.get("s").map(String::as_str), Some("text"));
    }

    #[test]
    fn deserialized_message_may_carry_null_payload() {
        let json = json!({
            "id": Uuid::new_v4(),
            "timestamp": Utc::now(),
            "payload": null,
        });
        let msg: Message = serde_json::from_value(json).unwrap();
        assert!(msg.payload().is_null());
        assert!(msg.headers().is_empty());
    }

    #[test]
    fn contains_all_checks_values() {
        let big: MessageHeaders = headers(&[("a", json!(1)), ("b", json!(2))])
            .into_iter()
            .collect();
        let small: MessageHeaders = headers(&[("a", json!(1))]).into_iter().collect();
        let different: MessageHeaders = headers(&[("a", json!(9))]).into_iter().collect();
        assert!(big.contains_all(&small));
        assert!(!small.contains_all(&big));
        assert!(!big.contains_all(&different));
    }
}
