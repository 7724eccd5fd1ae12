//! The append-only stock ledger.
//!
//! Current stock is never stored; it is always the sum over the ledger:
//! Σ INCREASE.quantity − Σ DECREASE.quantity. Entries are immutable once
//! appended.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, StockEntryId};
use document_store::DocumentStore;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StockOperation {
    Increase,
    Decrease,
}

impl StockOperation {
    /// Returns the operation name as stored on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            StockOperation::Increase => "INCREASE",
            StockOperation::Decrease => "DECREASE",
        }
    }
}

impl std::fmt::Display for StockOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One signed ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockEntry {
    pub id: StockEntryId,
    pub product_id: ProductId,
    #[serde(rename = "type")]
    pub operation: StockOperation,
    pub quantity: u32,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

impl StockEntry {
    /// Creates a new ledger entry with a fresh id.
    pub fn new(
        product_id: ProductId,
        operation: StockOperation,
        quantity: u32,
        reason: impl Into<String>,
        order_id: Option<OrderId>,
    ) -> Self {
        Self {
            id: StockEntryId::new(),
            product_id,
            operation,
            quantity,
            reason: reason.into(),
            order_id,
            created_at: Utc::now(),
        }
    }

    /// The signed contribution of this entry to the ledger sum.
    pub fn signed_quantity(&self) -> i64 {
        match self.operation {
            StockOperation::Increase => i64::from(self.quantity),
            StockOperation::Decrease => -i64::from(self.quantity),
        }
    }
}

/// An order's outstanding (uncompensated) reservation of one product.
#[derive(Debug, Clone)]
pub struct OrderReservation {
    pub order_id: OrderId,
    pub product_id: ProductId,
    /// Net reserved quantity: Σ DECREASE − Σ INCREASE among the order's
    /// entries for this product. Positive means not yet compensated.
    pub net_quantity: i64,
    /// Timestamp of the oldest DECREASE in the group.
    pub oldest_decrease_at: DateTime<Utc>,
}

/// Append and sum access to the stock ledger table.
#[derive(Clone)]
pub struct StockLedger<S> {
    store: S,
    table: String,
}

impl<S: DocumentStore> StockLedger<S> {
    /// Creates a ledger over the given table.
    pub fn new(store: S, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    /// Appends an entry. This is the commit point of every stock mutation.
    #[tracing::instrument(skip(self, entry), fields(product_id = %entry.product_id, operation = %entry.operation))]
    pub async fn append(&self, entry: &StockEntry) -> Result<(), DomainError> {
        self.store
            .insert(
                &self.table,
                &entry.id.to_string(),
                serde_json::to_value(entry)?,
            )
            .await?;
        Ok(())
    }

    /// Computes the current stock of a product from the ledger sum.
    #[tracing::instrument(skip(self))]
    pub async fn current_stock(&self, product_id: &ProductId) -> Result<i64, DomainError> {
        let documents = self
            .store
            .query_index(&self.table, "productId", product_id.as_str())
            .await?;

        let mut sum = 0i64;
        for document in documents {
            let entry: StockEntry = serde_json::from_value(document)?;
            sum += entry.signed_quantity();
        }
        Ok(sum)
    }

    /// Returns every entry in the ledger.
    pub async fn all(&self) -> Result<Vec<StockEntry>, DomainError> {
        let documents = self.store.scan(&self.table).await?;
        let mut entries = Vec::with_capacity(documents.len());
        for document in documents {
            entries.push(serde_json::from_value(document)?);
        }
        Ok(entries)
    }

    /// Groups order-tagged entries into net outstanding reservations.
    ///
    /// Only groups with a positive net DECREASE are returned; a group whose
    /// compensating INCREASEs already balance it drops out, which is what
    /// makes the reaper sweep re-runnable.
    pub async fn outstanding_reservations(&self) -> Result<Vec<OrderReservation>, DomainError> {
        let mut groups: HashMap<(OrderId, ProductId), (i64, Option<DateTime<Utc>>)> =
            HashMap::new();

        for entry in self.all().await? {
            let Some(order_id) = entry.order_id else {
                continue;
            };
            let group = groups
                .entry((order_id, entry.product_id.clone()))
                .or_insert((0, None));
            match entry.operation {
                StockOperation::Decrease => {
                    group.0 += i64::from(entry.quantity);
                    group.1 = Some(match group.1 {
                        Some(oldest) => oldest.min(entry.created_at),
                        None => entry.created_at,
                    });
                }
                StockOperation::Increase => {
                    group.0 -= i64::from(entry.quantity);
                }
            }
        }

        let reservations = groups
            .into_iter()
            .filter_map(|((order_id, product_id), (net, oldest))| {
                let oldest_decrease_at = oldest?;
                (net > 0).then_some(OrderReservation {
                    order_id,
                    product_id,
                    net_quantity: net,
                    oldest_decrease_at,
                })
            })
            .collect();
        Ok(reservations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_store::InMemoryDocumentStore;

    fn ledger() -> StockLedger<InMemoryDocumentStore> {
        StockLedger::new(InMemoryDocumentStore::new(), "product-stock")
    }

    #[tokio::test]
    async fn current_stock_is_the_signed_sum() {
        let ledger = ledger();
        let p1 = ProductId::new("p1");

        ledger
            .append(&StockEntry::new(
                p1.clone(),
                StockOperation::Increase,
                100,
                "Initial load",
                None,
            ))
            .await
            .unwrap();
        ledger
            .append(&StockEntry::new(
                p1.clone(),
                StockOperation::Decrease,
                2,
                "Order sale",
                Some(OrderId::new()),
            ))
            .await
            .unwrap();
        ledger
            .append(&StockEntry::new(
                p1.clone(),
                StockOperation::Decrease,
                3,
                "Order sale",
                Some(OrderId::new()),
            ))
            .await
            .unwrap();

        assert_eq!(ledger.current_stock(&p1).await.unwrap(), 95);
    }

    #[tokio::test]
    async fn stock_of_unknown_product_is_zero() {
        let ledger = ledger();
        assert_eq!(
            ledger.current_stock(&ProductId::new("ghost")).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn sums_are_per_product() {
        let ledger = ledger();
        ledger
            .append(&StockEntry::new(
                ProductId::new("p1"),
                StockOperation::Increase,
                10,
                "Initial load",
                None,
            ))
            .await
            .unwrap();
        ledger
            .append(&StockEntry::new(
                ProductId::new("p2"),
                StockOperation::Increase,
                7,
                "Initial load",
                None,
            ))
            .await
            .unwrap();

        assert_eq!(ledger.current_stock(&ProductId::new("p1")).await.unwrap(), 10);
        assert_eq!(ledger.current_stock(&ProductId::new("p2")).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn outstanding_reservations_net_out_compensations() {
        let ledger = ledger();
        let order_a = OrderId::new();
        let order_b = OrderId::new();
        let p1 = ProductId::new("p1");

        // order_a reserved 5, compensated 5: balanced.
        ledger
            .append(&StockEntry::new(
                p1.clone(),
                StockOperation::Decrease,
                5,
                "Order sale",
                Some(order_a),
            ))
            .await
            .unwrap();
        ledger
            .append(&StockEntry::new(
                p1.clone(),
                StockOperation::Increase,
                5,
                "Orphaned stock reservation release",
                Some(order_a),
            ))
            .await
            .unwrap();

        // order_b reserved 3, not compensated.
        ledger
            .append(&StockEntry::new(
                p1.clone(),
                StockOperation::Decrease,
                3,
                "Order sale",
                Some(order_b),
            ))
            .await
            .unwrap();

        let outstanding = ledger.outstanding_reservations().await.unwrap();
        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding[0].order_id, order_b);
        assert_eq!(outstanding[0].net_quantity, 3);
    }

    #[tokio::test]
    async fn untagged_entries_are_ignored_by_reservation_grouping() {
        let ledger = ledger();
        ledger
            .append(&StockEntry::new(
                ProductId::new("p1"),
                StockOperation::Decrease,
                4,
                "Shrinkage adjustment",
                None,
            ))
            .await
            .unwrap();

        assert!(ledger.outstanding_reservations().await.unwrap().is_empty());
    }

    #[test]
    fn operation_serializes_uppercase() {
        assert_eq!(
            serde_json::to_value(StockOperation::Decrease).unwrap(),
            serde_json::json!("DECREASE")
        );
    }

    #[test]
    fn entry_type_field_is_named_type_on_the_wire() {
        let entry = StockEntry::new(
            ProductId::new("p1"),
            StockOperation::Increase,
            1,
            "Initial load",
            None,
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "INCREASE");
        assert_eq!(json["productId"], "p1");
    }
}
