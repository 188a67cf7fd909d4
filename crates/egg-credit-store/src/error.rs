//! Error types for ledger storage.

use egg_credit_core::LedgerError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A stored key could not be decoded.
    #[error("corrupt key: {0}")]
    CorruptKey(String),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}
