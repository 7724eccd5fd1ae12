//! Worker error taxonomy.
//!
//! Fatal-per-record errors (validation, missing references, insufficient
//! stock, invalid transitions, malformed payloads) surrender the record to
//! the dead-letter queue. Transient errors (store or broker unavailable,
//! deadline exceeded) re-enqueue the record for redelivery.

use common::ProductId;
use document_store::StoreError;
use domain::{DomainError, OrderStatus};
use message_bus::BusError;
use thiserror::Error;

/// Errors raised while processing a single queue record.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The record body could not be deserialized.
    #[error("Malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A record field failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A required reference was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The ledger does not cover the requested quantity.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: i64,
    },

    /// The requested order status change is not allowed.
    #[error("Invalid order status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// An error occurred in the document store.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// An error occurred in the message bus.
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),
}

impl WorkerError {
    /// Returns true if redelivering the record may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            WorkerError::Store(e) => e.is_transient(),
            WorkerError::Bus(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<StoreError> for WorkerError {
    fn from(e: StoreError) -> Self {
        WorkerError::Store(e)
    }
}

impl From<DomainError> for WorkerError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Validation(msg) => WorkerError::Validation(msg),
            DomainError::NotFound { entity, id } => WorkerError::NotFound { entity, id },
            DomainError::InsufficientStock {
                product_id,
                requested,
                available,
            } => WorkerError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            DomainError::InvalidTransition { from, to } => {
                WorkerError::InvalidTransition { from, to }
            }
            DomainError::Store(e) => WorkerError::Store(e),
            DomainError::Serialization(e) => WorkerError::Malformed(e),
        }
    }
}
