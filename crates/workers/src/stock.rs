//! STOCK-WORKER: appends signed entries to the stock ledger.

use async_trait::async_trait;
use document_store::DocumentStore;
use domain::{ProductCatalog, StockEntry, StockLedger, StockOperation, StockUpdate};
use message_bus::MessageEnvelope;

use crate::config::PipelineConfig;
use crate::error::WorkerError;
use crate::runner::QueueWorker;

/// Consumes stock-mutation requests and commits them as ledger entries.
///
/// The DECREASE sufficiency check is advisory — the order worker already
/// checked — but is repeated here because messages may arrive interleaved
/// with unrelated operations.
#[derive(Clone)]
pub struct StockWorker<S> {
    catalog: ProductCatalog<S>,
    ledger: StockLedger<S>,
}

impl<S: DocumentStore + Clone> StockWorker<S> {
    /// Creates the worker over the configured tables.
    pub fn new(store: S, config: &PipelineConfig) -> Self {
        Self {
            catalog: ProductCatalog::new(store.clone(), config.product_table.clone()),
            ledger: StockLedger::new(store, config.stock_table.clone()),
        }
    }
}

#[async_trait]
impl<S: DocumentStore + Clone> QueueWorker for StockWorker<S> {
    fn name(&self) -> &'static str {
        "stock-worker"
    }

    #[tracing::instrument(skip(self, envelope), fields(message_id = %envelope.message_id))]
    async fn handle(&self, envelope: &MessageEnvelope) -> Result<(), WorkerError> {
        let update: StockUpdate = envelope.payload()?;

        if update.quantity == 0 {
            return Err(WorkerError::Validation(
                "Stock update quantity must be positive".to_string(),
            ));
        }

        let product = self
            .catalog
            .get(&update.product_id)
            .await?
            .ok_or_else(|| WorkerError::NotFound {
                entity: "Product",
                id: update.product_id.to_string(),
            })?;
        if !product.is_active {
            return Err(WorkerError::Validation(format!(
                "Product {} is inactive",
                product.id
            )));
        }

        if update.operation == StockOperation::Decrease {
            let available = self.ledger.current_stock(&update.product_id).await?;
            if available < i64::from(update.quantity) {
                return Err(WorkerError::InsufficientStock {
                    product_id: update.product_id,
                    requested: update.quantity,
                    available,
                });
            }
        }

        let entry = StockEntry::new(
            update.product_id,
            update.operation,
            update.quantity,
            update.reason,
            update.order_id,
        );
        self.ledger.append(&entry).await?;
        metrics::counter!("stock_entries_total", "operation" => update.operation.as_str())
            .increment(1);
        tracing::info!(entry_id = %entry.id, product_id = %entry.product_id, operation = %entry.operation, quantity = entry.quantity, "stock entry appended");
        Ok(())
    }
}
