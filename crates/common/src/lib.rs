//! Identifier types shared across the order-processing pipeline.

pub mod types;

pub use types::{LeadId, OrderId, ProductId, StockEntryId, TransactionId};
