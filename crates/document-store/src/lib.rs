//! Key-value document storage for the order-processing pipeline.
//!
//! The pipeline keeps all durable state in named tables of JSON documents.
//! Mutual exclusion is delegated entirely to conditional writes: inserts
//! succeed only when the key is absent, patches only when it is present.
//! There are no locks anywhere above this seam.

pub mod error;
pub mod memory;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryDocumentStore;
pub use store::{Document, DocumentStore};
