//! The order aggregate and its status state machine.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{LeadId, OrderId, ProductId, TransactionId};
use document_store::DocumentStore;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::messages::{AddressData, CustomerData};
use crate::money::Money;
use crate::product::Product;

/// The status of an order in its lifecycle.
///
/// Transitions:
/// ```text
/// PENDING ──► PROCESSED
///    │
///    └──────► CANCELLED
/// ```
/// Both PROCESSED and CANCELLED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Order created, payment outcome not yet known.
    #[default]
    Pending,

    /// Payment approved (terminal).
    Processed,

    /// Order failed or payment declined (terminal).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if an order may move from this status to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Processed)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
        )
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Processed | OrderStatus::Cancelled)
    }

    /// Returns the status name as stored on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processed => "PROCESSED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An order item after catalog enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedItem {
    pub id: ProductId,
    pub quantity: u32,
    pub product_name: String,
    pub unit_price: Money,
    pub total_price: Money,
    pub has_stock_control: bool,
}

impl EnrichedItem {
    /// Enriches a requested quantity from a catalog entry.
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            id: product.id.clone(),
            quantity,
            product_name: product.name.clone(),
            unit_price: product.price,
            total_price: product.price.multiply(quantity),
            has_stock_control: product.has_stock_control,
        }
    }

    /// Placeholder for a product id the catalog does not know.
    pub fn unknown(id: ProductId, quantity: u32) -> Self {
        Self {
            id,
            quantity,
            product_name: "Unknown Product".to_string(),
            unit_price: Money::zero(),
            total_price: Money::zero(),
            has_stock_control: false,
        }
    }
}

/// The order aggregate as persisted in the order table.
///
/// Created once by the order worker with `status = PENDING`; only the
/// update worker mutates it afterwards, and only along the state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub lead_id: LeadId,
    pub customer_data: CustomerData,
    pub items: Vec<EnrichedItem>,
    pub total_items: u32,
    pub total_value: Money,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_data: Option<AddressData>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<TransactionId>,
}

impl Order {
    /// Creates a pending order, computing the totals from the enriched
    /// items. Totals are immutable after this point.
    pub fn create(
        id: OrderId,
        lead_id: LeadId,
        customer_data: CustomerData,
        items: Vec<EnrichedItem>,
        address_data: Option<AddressData>,
    ) -> Self {
        let total_items = items.iter().map(|item| item.quantity).sum();
        let total_value = items.iter().map(|item| item.total_price).sum();
        let now = Utc::now();

        Self {
            id,
            lead_id,
            customer_data,
            items,
            total_items,
            total_value,
            status: OrderStatus::Pending,
            address_data,
            created_at: now,
            updated_at: now,
            reason: None,
            transaction_id: None,
        }
    }
}

/// Store access for the order table.
#[derive(Clone)]
pub struct OrderRepository<S> {
    store: S,
    table: String,
}

impl<S: DocumentStore> OrderRepository<S> {
    /// Creates a repository over the given table.
    pub fn new(store: S, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    /// Inserts an order under the precondition that its id is absent.
    ///
    /// Returns `false` when a row already exists; duplicate delivery of the
    /// same order is an idempotent no-op for the caller.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn insert_new(&self, order: &Order) -> Result<bool, DomainError> {
        match self
            .store
            .insert(
                &self.table,
                &order.id.to_string(),
                serde_json::to_value(order)?,
            )
            .await
        {
            Ok(()) => Ok(true),
            Err(document_store::StoreError::Conflict { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Loads an order by id.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, DomainError> {
        let document = self.store.get(&self.table, &id.to_string()).await?;
        match document {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    /// Applies a validated status transition as a conditional patch.
    ///
    /// Fails with [`DomainError::NotFound`] when the order is missing and
    /// [`DomainError::InvalidTransition`] when the state machine forbids
    /// the move.
    #[tracing::instrument(skip(self, reason))]
    pub async fn apply_status_update(
        &self,
        id: OrderId,
        status: OrderStatus,
        reason: Option<String>,
        transaction_id: Option<TransactionId>,
    ) -> Result<(), DomainError> {
        let order = self.get(id).await?.ok_or(DomainError::NotFound {
            entity: "Order",
            id: id.to_string(),
        })?;

        if !order.status.can_transition_to(status) {
            return Err(DomainError::InvalidTransition {
                from: order.status,
                to: status,
            });
        }

        let mut fields = HashMap::new();
        fields.insert("status".to_string(), serde_json::to_value(status)?);
        fields.insert("updatedAt".to_string(), serde_json::to_value(Utc::now())?);
        if let Some(reason) = reason {
            fields.insert("reason".to_string(), serde_json::to_value(reason)?);
        }
        if let Some(transaction_id) = transaction_id {
            fields.insert(
                "transactionId".to_string(),
                serde_json::to_value(transaction_id)?,
            );
        }

        self.store.patch(&self.table, &id.to_string(), fields).await?;
        Ok(())
    }
}
