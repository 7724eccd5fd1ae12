//! Durable publish/subscribe fabric for the order-processing pipeline.
//!
//! Two delivery primitives: topics fan out each published message to every
//! subscribed queue, and queues deliver to a single consumer at least once.
//! Delivery is at-least-once; consumers are responsible for idempotency.

pub mod bus;
pub mod envelope;
pub mod error;
pub mod memory;

pub use bus::MessageBus;
pub use envelope::{MessageEnvelope, MessageId};
pub use error::{BusError, Result};
pub use memory::InMemoryMessageBus;
