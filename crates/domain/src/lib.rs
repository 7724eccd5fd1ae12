//! Domain layer for the order-processing pipeline.
//!
//! This crate provides the records the pipeline persists (leads, orders,
//! products, stock ledger entries, transactions), the order status state
//! machine, the inter-worker message payloads, input normalization and
//! sensitive-field masking, and typed repositories generic over the
//! document store.

pub mod error;
pub mod lead;
pub mod masking;
pub mod messages;
pub mod money;
pub mod order;
pub mod product;
pub mod sanitize;
pub mod stock;
pub mod transaction;

pub use error::DomainError;
pub use lead::{Lead, LeadDirectory};
pub use messages::{
    AddressData, CustomerData, INITIALIZE_ORDER_SUBJECT, InitializeOrder, OrderItemRequest,
    PaymentData, ProcessTransaction, StockUpdate, UpdateOrder,
};
pub use money::Money;
pub use order::{EnrichedItem, Order, OrderRepository, OrderStatus};
pub use product::{Product, ProductCatalog};
pub use stock::{OrderReservation, StockEntry, StockLedger, StockOperation};
pub use transaction::{PaymentStatus, Transaction, TransactionRepository};
