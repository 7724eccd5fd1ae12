//! UPDATE-WORKER: advances orders through the status state machine.

use async_trait::async_trait;
use document_store::DocumentStore;
use domain::{OrderRepository, UpdateOrder};
use message_bus::MessageEnvelope;

use crate::config::PipelineConfig;
use crate::error::WorkerError;
use crate::runner::QueueWorker;

/// Consumes status updates and applies them as validated conditional
/// patches. Invalid transitions are fatal for the record; the order row is
/// left untouched.
#[derive(Clone)]
pub struct UpdateWorker<S> {
    orders: OrderRepository<S>,
}

impl<S: DocumentStore + Clone> UpdateWorker<S> {
    /// Creates the worker over the configured order table.
    pub fn new(store: S, config: &PipelineConfig) -> Self {
        Self {
            orders: OrderRepository::new(store, config.order_table.clone()),
        }
    }
}

#[async_trait]
impl<S: DocumentStore + Clone> QueueWorker for UpdateWorker<S> {
    fn name(&self) -> &'static str {
        "update-worker"
    }

    #[tracing::instrument(skip(self, envelope), fields(message_id = %envelope.message_id))]
    async fn handle(&self, envelope: &MessageEnvelope) -> Result<(), WorkerError> {
        let update: UpdateOrder = envelope.payload()?;

        self.orders
            .apply_status_update(
                update.order_id,
                update.status,
                update.reason.clone(),
                update.transaction_id.clone(),
            )
            .await?;

        metrics::counter!("order_updates_total", "status" => update.status.as_str()).increment(1);
        tracing::info!(order_id = %update.order_id, status = %update.status, "order status updated");
        Ok(())
    }
}
