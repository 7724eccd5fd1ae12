use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;

/// A stored document. Documents are plain JSON objects; typed access lives
/// in the repositories that wrap the store.
pub type Document = serde_json::Value;

/// Abstraction over a key-value document store with conditional writes.
///
/// Tables are addressed by name; every document is keyed by an opaque string
/// id which must also be present in the document body under `"id"`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Loads a document by key. Returns `None` when absent.
    async fn get(&self, table: &str, id: &str) -> Result<Option<Document>>;

    /// Inserts a document under the precondition that the key is absent.
    ///
    /// Fails with [`StoreError::Conflict`](crate::StoreError::Conflict) when
    /// a document with the same id already exists.
    async fn insert(&self, table: &str, id: &str, document: Document) -> Result<()>;

    /// Merges the given top-level fields into an existing document.
    ///
    /// Fails with [`StoreError::NotFound`](crate::StoreError::NotFound) when
    /// no document exists under the key.
    async fn patch(&self, table: &str, id: &str, fields: HashMap<String, Document>) -> Result<()>;

    /// Returns all documents whose top-level `field` equals `value`.
    ///
    /// Models a secondary-index query; `value` is compared against the
    /// string representation of the field.
    async fn query_index(&self, table: &str, field: &str, value: &str) -> Result<Vec<Document>>;

    /// Returns every document in a table.
    async fn scan(&self, table: &str) -> Result<Vec<Document>>;
}
