//! LEAD-WORKER: deduplicates customer identities from the INITIALIZE fan-out.

use async_trait::async_trait;
use document_store::DocumentStore;
use domain::masking::mask_email;
use domain::sanitize::{normalize_cpf, normalize_email};
use domain::{InitializeOrder, LeadDirectory};
use message_bus::MessageEnvelope;

use crate::config::PipelineConfig;
use crate::error::WorkerError;
use crate::runner::QueueWorker;

/// Consumes INITIALIZE records and upserts the customer identity.
///
/// Best-effort and non-blocking with respect to the rest of the pipeline:
/// the order worker performs the same find-or-create independently, so a
/// failure here never stalls an order.
#[derive(Clone)]
pub struct LeadWorker<S> {
    leads: LeadDirectory<S>,
}

impl<S: DocumentStore + Clone> LeadWorker<S> {
    /// Creates the worker over the configured lead table.
    pub fn new(store: S, config: &PipelineConfig) -> Self {
        Self {
            leads: LeadDirectory::new(store, config.lead_table.clone()),
        }
    }
}

#[async_trait]
impl<S: DocumentStore + Clone> QueueWorker for LeadWorker<S> {
    fn name(&self) -> &'static str {
        "lead-worker"
    }

    #[tracing::instrument(skip(self, envelope), fields(message_id = %envelope.message_id))]
    async fn handle(&self, envelope: &MessageEnvelope) -> Result<(), WorkerError> {
        let record: InitializeOrder = envelope.payload()?;
        let customer = &record.customer_data;

        // Errors must not leak the raw identity; mask before reporting.
        let cpf = normalize_cpf(&customer.cpf).ok_or_else(|| {
            WorkerError::Validation(format!(
                "Invalid CPF for customer {}",
                mask_email(&customer.email)
            ))
        })?;
        let email = normalize_email(&customer.email);
        if email.is_empty() {
            return Err(WorkerError::Validation(format!(
                "Missing email for order {}",
                record.order_id
            )));
        }

        let lead = self
            .leads
            .find_or_create(customer.name.trim(), &email, &cpf)
            .await?;
        tracing::debug!(lead_id = %lead.id, order_id = %record.order_id, "lead resolved");
        Ok(())
    }
}
