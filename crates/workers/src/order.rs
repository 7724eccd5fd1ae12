//! ORDER-WORKER: enriches, reserves stock, creates the order, and
//! dispatches payment.
//!
//! Phases run in a fixed order; each phase's failure semantics differ:
//!
//! * Phase A (enrichment) fails the record on inactive products or
//!   insufficient stock before anything is published.
//! * Phase B (stock reservation) fans out DECREASE messages in parallel and
//!   raises the first publish error; already-published messages are not
//!   rolled back here — the reaper reconciles orphans.
//! * Phase C (lead association) shares the lead worker's find-or-create.
//! * Phase D (order creation) treats a conditional-insert conflict as
//!   idempotent success and ends the record, so a replayed message never
//!   re-dispatches payment.
//! * Phase E (payment dispatch) is logged on failure but never fails the
//!   record; the order already exists in PENDING.

use async_trait::async_trait;
use document_store::DocumentStore;
use domain::masking::mask_email;
use domain::sanitize::{normalize_cpf, normalize_email};
use domain::{
    CustomerData, EnrichedItem, InitializeOrder, Lead, LeadDirectory, Money, Order,
    OrderItemRequest, OrderRepository, ProcessTransaction, ProductCatalog, StockLedger,
    StockOperation, StockUpdate,
};
use futures_util::future::try_join_all;
use message_bus::{MessageBus, MessageEnvelope};

use crate::config::PipelineConfig;
use crate::error::WorkerError;
use crate::message_envelope;
use crate::runner::QueueWorker;

/// Reason recorded on every sale reservation.
const SALE_REASON: &str = "Order sale";

/// Consumes INITIALIZE records and creates pending orders.
#[derive(Clone)]
pub struct OrderWorker<S, B> {
    catalog: ProductCatalog<S>,
    ledger: StockLedger<S>,
    leads: LeadDirectory<S>,
    orders: OrderRepository<S>,
    bus: B,
    stock_queue: String,
    payment_queue: String,
}

impl<S: DocumentStore + Clone, B: MessageBus> OrderWorker<S, B> {
    /// Creates the worker over the configured tables and queues.
    pub fn new(store: S, bus: B, config: &PipelineConfig) -> Self {
        Self {
            catalog: ProductCatalog::new(store.clone(), config.product_table.clone()),
            ledger: StockLedger::new(store.clone(), config.stock_table.clone()),
            leads: LeadDirectory::new(store.clone(), config.lead_table.clone()),
            orders: OrderRepository::new(store, config.order_table.clone()),
            bus,
            stock_queue: config.stock_queue.clone(),
            payment_queue: config.payment_queue.clone(),
        }
    }

    /// Phase A: load and price each item, checking stock where controlled.
    async fn enrich_items(
        &self,
        requests: &[OrderItemRequest],
    ) -> Result<Vec<EnrichedItem>, WorkerError> {
        let mut enriched = Vec::with_capacity(requests.len());
        for request in requests {
            match self.catalog.get(&request.id).await? {
                None => {
                    tracing::warn!(product_id = %request.id, "product missing from catalog, enriching as unknown");
                    enriched.push(EnrichedItem::unknown(request.id.clone(), request.quantity));
                }
                Some(product) if !product.is_active => {
                    return Err(WorkerError::Validation(format!(
                        "Product {} is inactive",
                        product.id
                    )));
                }
                Some(product) => {
                    if product.has_stock_control {
                        let available = self.ledger.current_stock(&product.id).await?;
                        if available < i64::from(request.quantity) {
                            return Err(WorkerError::InsufficientStock {
                                product_id: product.id,
                                requested: request.quantity,
                                available,
                            });
                        }
                    }
                    enriched.push(EnrichedItem::from_product(&product, request.quantity));
                }
            }
        }
        Ok(enriched)
    }

    /// Phase B: publish one DECREASE per stock-controlled item, in parallel.
    async fn reserve_stock(
        &self,
        order_id: common::OrderId,
        items: &[EnrichedItem],
    ) -> Result<(), WorkerError> {
        let publishes = items
            .iter()
            .filter(|item| item.has_stock_control && item.quantity > 0)
            .map(|item| {
                let update = StockUpdate {
                    product_id: item.id.clone(),
                    quantity: item.quantity,
                    operation: StockOperation::Decrease,
                    order_id: Some(order_id),
                    reason: SALE_REASON.to_string(),
                };
                async move {
                    let envelope = message_envelope(&update, update.attributes())?;
                    self.bus.send(&self.stock_queue, envelope).await
                }
            });

        try_join_all(publishes).await?;
        Ok(())
    }

    /// Phase C: resolve the customer identity, creating the lead if needed.
    async fn associate_lead(&self, customer: &CustomerData) -> Result<(Lead, CustomerData), WorkerError> {
        let cpf = normalize_cpf(&customer.cpf).ok_or_else(|| {
            WorkerError::Validation(format!(
                "Invalid CPF for customer {}",
                mask_email(&customer.email)
            ))
        })?;
        let email = normalize_email(&customer.email);
        let name = customer.name.trim().to_string();

        let lead = self.leads.find_or_create(&name, &email, &cpf).await?;
        Ok((lead, CustomerData { cpf, email, name }))
    }

    /// Phase E: best-effort payment dispatch.
    async fn dispatch_payment(&self, record: &InitializeOrder, total_value: Money) {
        let (Some(payment_data), Some(address_data)) =
            (record.payment_data.clone(), record.address_data.clone())
        else {
            tracing::warn!(order_id = %record.order_id, "no payment data on record, skipping payment dispatch");
            return;
        };

        let request = ProcessTransaction {
            order_id: record.order_id,
            order_total_value: total_value,
            payment_data,
            address_data,
            customer_data: record.customer_data.clone(),
        };

        let publish = async {
            let envelope = message_envelope(&request, request.attributes())?;
            self.bus.send(&self.payment_queue, envelope).await
        };
        if let Err(e) = publish.await {
            // The order stays PENDING; a redrive or manual dispatch picks it up.
            tracing::error!(error = %e, order_id = %record.order_id, "payment dispatch failed");
        }
    }
}

#[async_trait]
impl<S: DocumentStore + Clone, B: MessageBus> QueueWorker for OrderWorker<S, B> {
    fn name(&self) -> &'static str {
        "order-worker"
    }

    #[tracing::instrument(skip(self, envelope), fields(message_id = %envelope.message_id))]
    async fn handle(&self, envelope: &MessageEnvelope) -> Result<(), WorkerError> {
        let record: InitializeOrder = envelope.payload()?;

        let items = self.enrich_items(&record.items).await?;
        self.reserve_stock(record.order_id, &items).await?;
        let (lead, customer_data) = self.associate_lead(&record.customer_data).await?;

        let order = Order::create(
            record.order_id,
            lead.id,
            customer_data,
            items,
            record.address_data.clone(),
        );

        if !self.orders.insert_new(&order).await? {
            tracing::info!(order_id = %order.id, "order already exists, treating duplicate delivery as success");
            return Ok(());
        }
        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.id, total_value = %order.total_value, "order created");

        self.dispatch_payment(&record, order.total_value).await;
        Ok(())
    }
}
