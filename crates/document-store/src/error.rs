use thiserror::Error;

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional insert found the key already present.
    ///
    /// Create paths treat this as idempotent success; everything else
    /// surfaces it.
    #[error("Document already exists in {table}: {id}")]
    Conflict { table: String, id: String },

    /// A conditional patch found no document under the key.
    #[error("Document not found in {table}: {id}")]
    NotFound { table: String, id: String },

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store could not be reached; the operation may be retried.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns true if retrying the operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
