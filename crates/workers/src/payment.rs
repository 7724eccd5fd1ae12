//! PAYMENT-WORKER: drives the gateway and records the authoritative
//! payment outcome.

use std::time::Instant;

use async_trait::async_trait;
use document_store::DocumentStore;
use domain::{
    OrderRepository, OrderStatus, PaymentStatus, ProcessTransaction, Transaction,
    TransactionRepository, UpdateOrder,
};
use message_bus::{MessageBus, MessageEnvelope};

use crate::config::PipelineConfig;
use crate::error::WorkerError;
use crate::gateway::{GatewayOutcome, PaymentGateway};
use crate::message_envelope;
use crate::runner::QueueWorker;

/// Consumes payment requests, charges the gateway, writes the transaction,
/// and emits the order status update.
///
/// Transaction ids derive from the order id, so a redelivered request hits
/// the conditional insert, observes the existing row, and publishes nothing.
#[derive(Clone)]
pub struct PaymentWorker<S, B, G> {
    orders: OrderRepository<S>,
    transactions: TransactionRepository<S>,
    gateway: G,
    bus: B,
    update_queue: String,
}

impl<S: DocumentStore + Clone, B: MessageBus, G: PaymentGateway> PaymentWorker<S, B, G> {
    /// Creates the worker over the configured tables and queues.
    pub fn new(store: S, bus: B, gateway: G, config: &PipelineConfig) -> Self {
        Self {
            orders: OrderRepository::new(store.clone(), config.order_table.clone()),
            transactions: TransactionRepository::new(store, config.transaction_table.clone()),
            gateway,
            bus,
            update_queue: config.update_queue.clone(),
        }
    }

    async fn process(&self, request: &ProcessTransaction) -> Result<(), WorkerError> {
        let order = self
            .orders
            .get(request.order_id)
            .await?
            .ok_or_else(|| WorkerError::NotFound {
                entity: "Order",
                id: request.order_id.to_string(),
            })?;

        let started = Instant::now();
        let outcome = self
            .gateway
            .charge(request.order_total_value, &request.payment_data.card_number)
            .await;
        let processing_time = started.elapsed().as_millis() as u64;

        let (payment_status, auth_code, status, reason) = match outcome {
            GatewayOutcome::Approved { auth_code } => {
                (PaymentStatus::Approved, Some(auth_code), OrderStatus::Processed, None)
            }
            GatewayOutcome::Declined { reason } => (
                PaymentStatus::Declined,
                None,
                OrderStatus::Cancelled,
                Some(format!("Payment declined: {reason}")),
            ),
            GatewayOutcome::Errored { message } => (
                PaymentStatus::Error,
                None,
                OrderStatus::Cancelled,
                Some(format!("Payment processing error: {message}")),
            ),
        };

        let transaction = Transaction::record(
            order.id,
            request.order_total_value,
            payment_status,
            auth_code,
            processing_time,
            &request.payment_data,
            &request.address_data,
            &request.customer_data,
        );

        if !self.transactions.insert_new(&transaction).await? {
            tracing::info!(transaction_id = %transaction.id, "transaction already recorded, skipping status update");
            return Ok(());
        }
        metrics::counter!("payments_total", "status" => payment_status.as_str()).increment(1);
        metrics::histogram!("payment_processing_seconds")
            .record(processing_time as f64 / 1000.0);
        tracing::info!(transaction_id = %transaction.id, status = %payment_status, processing_time, "transaction recorded");

        self.publish_update(UpdateOrder {
            order_id: order.id,
            status,
            reason,
            transaction_id: Some(transaction.id),
        })
        .await
    }

    /// Best effort: record the failure and push the order to CANCELLED
    /// before the error propagates.
    async fn record_failure(&self, request: &ProcessTransaction, error: &WorkerError) {
        let transaction = Transaction::record(
            request.order_id,
            request.order_total_value,
            PaymentStatus::Error,
            None,
            0,
            &request.payment_data,
            &request.address_data,
            &request.customer_data,
        );
        if let Err(e) = self.transactions.insert_new(&transaction).await {
            tracing::error!(error = %e, order_id = %request.order_id, "failed to record error transaction");
        }

        let update = UpdateOrder {
            order_id: request.order_id,
            status: OrderStatus::Cancelled,
            reason: Some(format!("Payment processing error: {error}")),
            transaction_id: Some(transaction.id),
        };
        if let Err(e) = self.publish_update(update).await {
            tracing::error!(error = %e, order_id = %request.order_id, "failed to publish cancellation update");
        }
    }

    async fn publish_update(&self, update: UpdateOrder) -> Result<(), WorkerError> {
        let envelope = message_envelope(&update, update.attributes())?;
        self.bus.send(&self.update_queue, envelope).await?;
        Ok(())
    }

    fn validate(request: &ProcessTransaction) -> Result<(), WorkerError> {
        let payment = &request.payment_data;
        if payment.card_number.is_empty()
            || payment.card_holder_name.is_empty()
            || payment.cvv.is_empty()
        {
            return Err(WorkerError::Validation(
                "Payment request is missing card data".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl<S, B, G> QueueWorker for PaymentWorker<S, B, G>
where
    S: DocumentStore + Clone,
    B: MessageBus,
    G: PaymentGateway,
{
    fn name(&self) -> &'static str {
        "payment-worker"
    }

    #[tracing::instrument(skip(self, envelope), fields(message_id = %envelope.message_id))]
    async fn handle(&self, envelope: &MessageEnvelope) -> Result<(), WorkerError> {
        let request: ProcessTransaction = envelope.payload()?;
        Self::validate(&request)?;

        match self.process(&request).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.record_failure(&request, &e).await;
                Err(e)
            }
        }
    }
}
