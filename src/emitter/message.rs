//! Message type carried through the emitter
//!
//! A message is addressed by its `topic`; every other field is free-form
//! payload. Fields are kept in a JSON map so that a serialised message reads
//! as a flat object: `{"topic": "a/b", "payload": {...}, "qos": 1}`.

use crate::emitter::error::{EmitterError, EmitterResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which [`Message::with_payload`] stores its value
pub const PAYLOAD_FIELD: &str = "payload";

/// Topic-addressed message
///
/// # Example
///
/// ```rust
/// use mqbus::emitter::Message;
/// use serde_json::json;
///
/// let message = Message::with_payload("sensors/kitchen/temp", json!(21.5))
///     .with_field("unit", json!("celsius"));
///
/// assert_eq!(message.topic, "sensors/kitchen/temp");
/// assert_eq!(message.payload(), Some(&json!(21.5)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Address the message is published under
    pub topic: String,
    /// Additional fields, serialised next to `topic`
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Message {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            fields: Map::new(),
        }
    }

    pub fn with_payload(topic: impl Into<String>, payload: Value) -> Self {
        Self::new(topic).with_field(PAYLOAD_FIELD, payload)
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn payload(&self) -> Option<&Value> {
        self.fields.get(PAYLOAD_FIELD)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Build a message from an arbitrary JSON object
    ///
    /// The object must carry a string `topic`; all other keys become fields.
    pub fn from_json(value: Value) -> EmitterResult<Self> {
        let Value::Object(mut fields) = value else {
            return Err(EmitterError::precondition("message must be a JSON object"));
        };

        match fields.remove("topic") {
            Some(Value::String(topic)) => Ok(Self { topic, fields }),
            Some(_) => Err(EmitterError::precondition("message topic must be a string")),
            None => Err(EmitterError::precondition("message must have a topic")),
        }
    }
}
