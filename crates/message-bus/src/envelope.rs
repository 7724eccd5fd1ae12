use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a new random message ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message flowing through a topic or queue.
///
/// The body is a JSON payload; attributes carry routing metadata alongside
/// it. `receive_count` tracks how many times a queue delivered the message,
/// which the workers use to bound redelivery before dead-lettering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Unique identifier for this message.
    pub message_id: MessageId,

    /// Human-readable subject (topic publishes only).
    pub subject: Option<String>,

    /// The message payload as JSON.
    pub body: serde_json::Value,

    /// String-valued message attributes.
    pub attributes: HashMap<String, String>,

    /// When the message was published.
    pub published_at: DateTime<Utc>,

    /// Number of times a queue has delivered this message.
    pub receive_count: u32,
}

impl MessageEnvelope {
    /// Creates an envelope from a serializable payload.
    pub fn new<T: Serialize>(payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            message_id: MessageId::new(),
            subject: None,
            body: serde_json::to_value(payload)?,
            attributes: HashMap::new(),
            published_at: Utc::now(),
            receive_count: 0,
        })
    }

    /// Creates an envelope from a raw JSON body.
    pub fn from_body(body: serde_json::Value) -> Self {
        Self {
            message_id: MessageId::new(),
            subject: None,
            body,
            attributes: HashMap::new(),
            published_at: Utc::now(),
            receive_count: 0,
        }
    }

    /// Sets the subject line.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Adds a string attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Deserializes the body into a typed payload.
    pub fn payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.body.clone())
    }
}
