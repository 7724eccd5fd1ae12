use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::bus::MessageBus;
use crate::envelope::MessageEnvelope;
use crate::error::{BusError, Result};

#[derive(Default)]
struct BrokerState {
    subscriptions: HashMap<String, Vec<String>>,
    queues: HashMap<String, VecDeque<MessageEnvelope>>,
}

/// In-memory message broker.
///
/// Topics fan out to subscribed queues; queues are FIFO. Queues spring into
/// existence on first send, so dead-letter queues need no setup.
#[derive(Clone, Default)]
pub struct InMemoryMessageBus {
    state: Arc<RwLock<BrokerState>>,
    fail_publish: Arc<AtomicBool>,
}

impl InMemoryMessageBus {
    /// Creates a new broker with no topics or queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a queue to a topic. Every message published to the topic
    /// is delivered to each subscribed queue once.
    pub async fn subscribe(&self, topic: impl Into<String>, queue: impl Into<String>) {
        let mut state = self.state.write().await;
        state
            .subscriptions
            .entry(topic.into())
            .or_default()
            .push(queue.into());
    }

    /// Simulates broker unavailability; publish and send fail with
    /// [`BusError::Unavailable`] until cleared.
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of messages waiting in a queue.
    pub async fn queue_len(&self, queue: &str) -> usize {
        self.state
            .read()
            .await
            .queues
            .get(queue)
            .map(|q| q.len())
            .unwrap_or(0)
    }

    /// Returns true if no queue holds any message.
    pub async fn is_drained(&self) -> bool {
        self.state.read().await.queues.values().all(|q| q.is_empty())
    }

    fn check_available(&self) -> Result<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(BusError::Unavailable(
                "in-memory broker marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn publish(&self, topic: &str, envelope: MessageEnvelope) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().await;

        let targets = state.subscriptions.get(topic).cloned().unwrap_or_default();
        for queue in targets {
            state
                .queues
                .entry(queue)
                .or_default()
                .push_back(envelope.clone());
        }
        Ok(())
    }

    async fn send(&self, queue: &str, envelope: MessageEnvelope) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().await;
        state
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back(envelope);
        Ok(())
    }

    async fn receive(&self, queue: &str, max_messages: usize) -> Result<Vec<MessageEnvelope>> {
        let mut state = self.state.write().await;
        let Some(pending) = state.queues.get_mut(queue) else {
            return Ok(Vec::new());
        };

        let count = max_messages.min(pending.len());
        let mut batch = Vec::with_capacity(count);
        for _ in 0..count {
            if let Some(mut envelope) = pending.pop_front() {
                envelope.receive_count += 1;
                batch.push(envelope);
            }
        }
        Ok(batch)
    }
}
