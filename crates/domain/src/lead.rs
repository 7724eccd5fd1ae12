//! Deduplicated customer identities.

use chrono::{DateTime, Utc};
use common::LeadId;
use document_store::DocumentStore;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A deduplicated customer identity, keyed by the (email, cpf) pair.
///
/// Leads are created on first sight of an identity and never updated or
/// deleted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: LeadId,
    pub cpf: String,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Creates a new lead. Inputs must already be normalized.
    pub fn new(name: impl Into<String>, email: impl Into<String>, cpf: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: LeadId::new(),
            cpf: cpf.into(),
            email: email.into(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Lookup and find-or-create access to the lead table.
///
/// Deduplication is a find-then-insert: a query on the email index filtered
/// by cpf, followed by a conditional insert on a fresh id when nothing
/// matches. Two concurrent creators for the same (email, cpf) can therefore
/// both insert; consumers treat any matching row as valid.
#[derive(Clone)]
pub struct LeadDirectory<S> {
    store: S,
    table: String,
}

impl<S: DocumentStore> LeadDirectory<S> {
    /// Creates a directory over the given table.
    pub fn new(store: S, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    /// Finds a lead by its normalized (email, cpf) identity.
    #[tracing::instrument(skip_all)]
    pub async fn find_by_identity(
        &self,
        email: &str,
        cpf: &str,
    ) -> Result<Option<Lead>, DomainError> {
        let documents = self.store.query_index(&self.table, "email", email).await?;
        for document in documents {
            let lead: Lead = serde_json::from_value(document)?;
            if lead.cpf == cpf {
                return Ok(Some(lead));
            }
        }
        Ok(None)
    }

    /// Returns the existing lead for the identity, creating it when absent.
    #[tracing::instrument(skip_all)]
    pub async fn find_or_create(
        &self,
        name: &str,
        email: &str,
        cpf: &str,
    ) -> Result<Lead, DomainError> {
        if let Some(existing) = self.find_by_identity(email, cpf).await? {
            return Ok(existing);
        }

        let lead = Lead::new(name, email, cpf);
        self.store
            .insert(
                &self.table,
                &lead.id.to_string(),
                serde_json::to_value(&lead)?,
            )
            .await?;
        tracing::info!(lead_id = %lead.id, "lead created");
        Ok(lead)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_store::InMemoryDocumentStore;

    fn directory() -> LeadDirectory<InMemoryDocumentStore> {
        LeadDirectory::new(InMemoryDocumentStore::new(), "leads")
    }

    #[tokio::test]
    async fn find_or_create_inserts_on_miss() {
        let leads = directory();

        let lead = leads
            .find_or_create("Ana", "ana@example.com", "12345678901")
            .await
            .unwrap();

        let found = leads
            .find_by_identity("ana@example.com", "12345678901")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, lead.id);
    }

    #[tokio::test]
    async fn find_or_create_is_a_noop_on_hit() {
        let leads = directory();

        let first = leads
            .find_or_create("Ana", "ana@example.com", "12345678901")
            .await
            .unwrap();
        let second = leads
            .find_or_create("Ana", "ana@example.com", "12345678901")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn same_email_different_cpf_is_a_distinct_lead() {
        let leads = directory();

        let first = leads
            .find_or_create("Ana", "ana@example.com", "12345678901")
            .await
            .unwrap();
        let second = leads
            .find_or_create("Ana", "ana@example.com", "10987654321")
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn missing_identity_is_not_found() {
        let leads = directory();
        let found = leads
            .find_by_identity("ghost@example.com", "12345678901")
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
