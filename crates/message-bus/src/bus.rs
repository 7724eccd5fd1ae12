use async_trait::async_trait;

use crate::envelope::MessageEnvelope;
use crate::error::Result;

/// Abstraction over the pipeline's pub/sub fabric.
///
/// `publish` delivers a copy of the message to every queue subscribed to the
/// topic; `send` targets one queue directly. `receive` removes up to
/// `max_messages` from the head of a queue; messages the consumer fails to
/// process must be re-enqueued by the consumer itself (the in-memory broker
/// does not model visibility timeouts).
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes a message to a fan-out topic.
    async fn publish(&self, topic: &str, envelope: MessageEnvelope) -> Result<()>;

    /// Sends a message directly to a queue.
    async fn send(&self, queue: &str, envelope: MessageEnvelope) -> Result<()>;

    /// Receives up to `max_messages` from a queue, incrementing each
    /// message's receive count.
    async fn receive(&self, queue: &str, max_messages: usize) -> Result<Vec<MessageEnvelope>>;
}
