//! Batch consumption loop shared by all workers.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use message_bus::{BusError, MessageBus, MessageEnvelope};

use crate::config::PipelineConfig;
use crate::error::WorkerError;

/// A queue consumer that processes one record at a time.
#[async_trait]
pub trait QueueWorker: Send + Sync {
    /// Stable worker name, used as a metric label and in logs.
    fn name(&self) -> &'static str;

    /// Processes a single record.
    async fn handle(&self, envelope: &MessageEnvelope) -> Result<(), WorkerError>;
}

/// Tuning knobs for the consumption loop.
#[derive(Debug, Clone, Copy)]
pub struct RunnerSettings {
    pub batch_size: usize,
    pub record_timeout: Duration,
    pub max_receive_count: u32,
    pub poll_interval: Duration,
}

impl From<&PipelineConfig> for RunnerSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            record_timeout: config.record_timeout,
            max_receive_count: config.max_receive_count,
            poll_interval: config.poll_interval,
        }
    }
}

/// Counts for one processed batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub processed: usize,
    pub redelivered: usize,
    pub dead_lettered: usize,
}

impl BatchOutcome {
    /// Total records seen in the batch.
    pub fn total(&self) -> usize {
        self.processed + self.redelivered + self.dead_lettered
    }
}

/// Drives a worker against its queue.
///
/// Records within a batch are processed sequentially for predictable
/// failure semantics; horizontal scale comes from running multiple
/// processes, not from intra-batch parallelism. Each record runs under a
/// deadline; exceeding it counts as a transient failure.
pub struct WorkerRunner<W, B> {
    worker: W,
    bus: B,
    queue: String,
    settings: RunnerSettings,
}

impl<W: QueueWorker, B: MessageBus> WorkerRunner<W, B> {
    /// Creates a runner for a worker and its queue.
    pub fn new(worker: W, bus: B, queue: impl Into<String>, settings: RunnerSettings) -> Self {
        Self {
            worker,
            bus,
            queue: queue.into(),
            settings,
        }
    }

    /// Receives one batch and processes it to completion.
    #[tracing::instrument(skip(self), fields(worker = self.worker.name(), queue = %self.queue))]
    pub async fn run_once(&self) -> Result<BatchOutcome, BusError> {
        let batch = self
            .bus
            .receive(&self.queue, self.settings.batch_size)
            .await?;

        let mut outcome = BatchOutcome::default();
        for envelope in batch {
            let started = Instant::now();
            let result =
                tokio::time::timeout(self.settings.record_timeout, self.worker.handle(&envelope))
                    .await;
            metrics::histogram!("record_processing_seconds", "worker" => self.worker.name())
                .record(started.elapsed().as_secs_f64());

            match result {
                Ok(Ok(())) => {
                    outcome.processed += 1;
                    metrics::counter!("records_processed_total", "worker" => self.worker.name())
                        .increment(1);
                }
                Ok(Err(e)) if e.is_transient() => {
                    tracing::warn!(error = %e, message_id = %envelope.message_id, "transient failure, surrendering record");
                    self.surrender(envelope, &mut outcome).await?;
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, message_id = %envelope.message_id, "fatal record failure");
                    self.dead_letter(envelope, &mut outcome).await?;
                }
                Err(_) => {
                    tracing::warn!(message_id = %envelope.message_id, "record deadline exceeded, surrendering record");
                    self.surrender(envelope, &mut outcome).await?;
                }
            }
        }
        Ok(outcome)
    }

    /// Runs forever, sleeping between empty polls.
    pub async fn run(self) {
        loop {
            match self.run_once().await {
                Ok(outcome) if outcome.total() > 0 => {}
                Ok(_) => tokio::time::sleep(self.settings.poll_interval).await,
                Err(e) => {
                    tracing::error!(error = %e, queue = %self.queue, "queue receive failed");
                    tokio::time::sleep(self.settings.poll_interval).await;
                }
            }
        }
    }

    async fn surrender(
        &self,
        envelope: MessageEnvelope,
        outcome: &mut BatchOutcome,
    ) -> Result<(), BusError> {
        if envelope.receive_count >= self.settings.max_receive_count {
            return self.dead_letter(envelope, outcome).await;
        }
        self.bus.send(&self.queue, envelope).await?;
        outcome.redelivered += 1;
        Ok(())
    }

    async fn dead_letter(
        &self,
        envelope: MessageEnvelope,
        outcome: &mut BatchOutcome,
    ) -> Result<(), BusError> {
        let dlq = format!("{}-dlq", self.queue);
        self.bus.send(&dlq, envelope).await?;
        outcome.dead_lettered += 1;
        metrics::counter!("records_dead_lettered_total", "worker" => self.worker.name())
            .increment(1);
        Ok(())
    }
}
