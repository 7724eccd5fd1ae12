use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    error::{Result, StoreError},
    store::{Document, DocumentStore},
};

/// In-memory document store implementation.
///
/// Stores tables as maps of JSON documents and simulates the conditional
/// write semantics of a cloud key-value store. Tables spring into existence
/// on first write; reading an unknown table yields empty results.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    tables: Arc<RwLock<HashMap<String, HashMap<String, Document>>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the store being unreachable; all operations fail with
    /// [`StoreError::Unavailable`] until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the number of documents in a table.
    pub async fn document_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .await
            .get(table)
            .map(|t| t.len())
            .unwrap_or(0)
    }

    /// Clears all tables.
    pub async fn clear(&self) {
        self.tables.write().await.clear();
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, table: &str, id: &str) -> Result<Option<Document>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.get(table).and_then(|t| t.get(id)).cloned())
    }

    async fn insert(&self, table: &str, id: &str, document: Document) -> Result<()> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let entries = tables.entry(table.to_string()).or_default();

        if entries.contains_key(id) {
            return Err(StoreError::Conflict {
                table: table.to_string(),
                id: id.to_string(),
            });
        }

        entries.insert(id.to_string(), document);
        Ok(())
    }

    async fn patch(&self, table: &str, id: &str, fields: HashMap<String, Document>) -> Result<()> {
        self.check_available()?;
        let mut tables = self.tables.write().await;

        let document = tables
            .get_mut(table)
            .and_then(|t| t.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            })?;

        if let Some(object) = document.as_object_mut() {
            for (key, value) in fields {
                object.insert(key, value);
            }
        }
        Ok(())
    }

    async fn query_index(&self, table: &str, field: &str, value: &str) -> Result<Vec<Document>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let Some(entries) = tables.get(table) else {
            return Ok(Vec::new());
        };

        let matches = entries
            .values()
            .filter(|doc| {
                doc.get(field)
                    .and_then(|v| v.as_str())
                    .is_some_and(|v| v == value)
            })
            .cloned()
            .collect();
        Ok(matches)
    }

    async fn scan(&self, table: &str) -> Result<Vec<Document>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_and_get() {
        let store = InMemoryDocumentStore::new();
        store
            .insert("orders", "o1", json!({"id": "o1", "status": "PENDING"}))
            .await
            .unwrap();

        let doc = store.get("orders", "o1").await.unwrap().unwrap();
        assert_eq!(doc["status"], "PENDING");
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = InMemoryDocumentStore::new();
        assert!(store.get("orders", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_conflicts_on_existing_key() {
        let store = InMemoryDocumentStore::new();
        store
            .insert("orders", "o1", json!({"id": "o1"}))
            .await
            .unwrap();

        let result = store.insert("orders", "o1", json!({"id": "o1"})).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn patch_merges_fields() {
        let store = InMemoryDocumentStore::new();
        store
            .insert("orders", "o1", json!({"id": "o1", "status": "PENDING"}))
            .await
            .unwrap();

        let mut fields = HashMap::new();
        fields.insert("status".to_string(), json!("CANCELLED"));
        fields.insert("reason".to_string(), json!("Payment declined"));
        store.patch("orders", "o1", fields).await.unwrap();

        let doc = store.get("orders", "o1").await.unwrap().unwrap();
        assert_eq!(doc["status"], "CANCELLED");
        assert_eq!(doc["reason"], "Payment declined");
        assert_eq!(doc["id"], "o1");
    }

    #[tokio::test]
    async fn patch_missing_document_fails() {
        let store = InMemoryDocumentStore::new();
        let result = store.patch("orders", "nope", HashMap::new()).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn query_index_matches_string_field() {
        let store = InMemoryDocumentStore::new();
        store
            .insert("leads", "l1", json!({"id": "l1", "email": "a@x.com"}))
            .await
            .unwrap();
        store
            .insert("leads", "l2", json!({"id": "l2", "email": "b@x.com"}))
            .await
            .unwrap();
        store
            .insert("leads", "l3", json!({"id": "l3", "email": "a@x.com"}))
            .await
            .unwrap();

        let matches = store.query_index("leads", "email", "a@x.com").await.unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[tokio::test]
    async fn scan_returns_all_documents() {
        let store = InMemoryDocumentStore::new();
        for i in 0..3 {
            store
                .insert("stock", &format!("s{i}"), json!({"id": format!("s{i}")}))
                .await
                .unwrap();
        }

        assert_eq!(store.scan("stock").await.unwrap().len(), 3);
        assert!(store.scan("empty").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unavailable_store_fails_all_operations() {
        let store = InMemoryDocumentStore::new();
        store.set_unavailable(true);

        let result = store.get("orders", "o1").await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(result.unwrap_err().is_transient());

        store.set_unavailable(false);
        assert!(store.get("orders", "o1").await.is_ok());
    }
}
