//! Orphaned-reservation reaper.
//!
//! The order worker publishes stock DECREASEs before the order row is
//! committed, and later-phase failures are not compensated inline. The
//! reaper closes that gap: it periodically scans the ledger for aged
//! DECREASE entries whose order never materialized and publishes
//! compensating INCREASEs through the stock queue, keeping the append
//! commit point in the stock worker.

use std::time::Duration;

use document_store::DocumentStore;
use domain::{OrderRepository, StockLedger, StockOperation, StockUpdate};
use message_bus::MessageBus;

use crate::config::PipelineConfig;
use crate::error::WorkerError;
use crate::message_envelope;

/// Reason recorded on every compensating INCREASE.
const RELEASE_REASON: &str = "Orphaned stock reservation release";

/// Counts for one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Number of compensating INCREASE messages published.
    pub released: usize,
}

/// Scans the ledger for reservations with no corresponding order.
#[derive(Clone)]
pub struct StockReaper<S, B> {
    ledger: StockLedger<S>,
    orders: OrderRepository<S>,
    bus: B,
    stock_queue: String,
    grace: Duration,
    interval: Duration,
}

impl<S: DocumentStore + Clone, B: MessageBus> StockReaper<S, B> {
    /// Creates the reaper over the configured tables and queue.
    pub fn new(store: S, bus: B, config: &PipelineConfig) -> Self {
        Self {
            ledger: StockLedger::new(store.clone(), config.stock_table.clone()),
            orders: OrderRepository::new(store, config.order_table.clone()),
            bus,
            stock_queue: config.stock_queue.clone(),
            grace: config.reaper_grace,
            interval: config.reaper_interval,
        }
    }

    /// Runs one sweep over the ledger.
    ///
    /// A reservation qualifies when its oldest DECREASE predates the grace
    /// cutoff, its net quantity is still positive, and the order id has no
    /// row. The compensating INCREASE carries the same order id, so the
    /// next sweep sees the group balanced and skips it.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self) -> Result<SweepOutcome, WorkerError> {
        let cutoff = chrono::Utc::now()
            - chrono::Duration::from_std(self.grace).unwrap_or_else(|_| chrono::Duration::zero());

        let mut outcome = SweepOutcome::default();
        for reservation in self.ledger.outstanding_reservations().await? {
            if reservation.oldest_decrease_at > cutoff {
                continue;
            }
            if self.orders.get(reservation.order_id).await?.is_some() {
                continue;
            }

            let update = StockUpdate {
                product_id: reservation.product_id.clone(),
                quantity: u32::try_from(reservation.net_quantity).unwrap_or(u32::MAX),
                operation: StockOperation::Increase,
                order_id: Some(reservation.order_id),
                reason: RELEASE_REASON.to_string(),
            };
            let envelope = message_envelope(&update, update.attributes())?;
            self.bus.send(&self.stock_queue, envelope).await?;

            metrics::counter!("stock_reservations_released_total").increment(1);
            tracing::warn!(
                order_id = %reservation.order_id,
                product_id = %reservation.product_id,
                quantity = reservation.net_quantity,
                "released orphaned stock reservation"
            );
            outcome.released += 1;
        }
        Ok(outcome)
    }

    /// Sweeps forever at the configured interval.
    pub async fn run(self) {
        loop {
            tokio::time::sleep(self.interval).await;
            if let Err(e) = self.sweep().await {
                tracing::error!(error = %e, "reaper sweep failed");
            }
        }
    }
}
