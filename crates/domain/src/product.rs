//! Product catalog entries.

use common::ProductId;
use document_store::DocumentStore;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::money::Money;

/// A catalog entry. Read-only from the workflow's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub description: String,
    pub is_active: bool,
    pub has_stock_control: bool,
}

/// Read access to the product table.
#[derive(Clone)]
pub struct ProductCatalog<S> {
    store: S,
    table: String,
}

impl<S: DocumentStore> ProductCatalog<S> {
    /// Creates a catalog over the given table.
    pub fn new(store: S, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    /// Loads a product by id.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: &ProductId) -> Result<Option<Product>, DomainError> {
        let document = self.store.get(&self.table, id.as_str()).await?;
        match document {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    /// Inserts a catalog entry. Used by seeding and tests; the workflow
    /// never writes here.
    pub async fn add(&self, product: &Product) -> Result<(), DomainError> {
        self.store
            .insert(
                &self.table,
                product.id.as_str(),
                serde_json::to_value(product)?,
            )
            .await?;
        Ok(())
    }
}
