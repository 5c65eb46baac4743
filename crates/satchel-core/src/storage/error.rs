//! Storage error types

use thiserror::Error;

/// Errors that can occur during storage operations.
///
/// Absence is not an error: `get` on a missing key resolves to `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Opening the database was denied, blocked by a version conflict, or
    /// the environment has no object store
    #[error("open error: {0}")]
    Open(String),

    /// Applying the upgrade schema failed
    #[error("upgrade error: {0}")]
    Upgrade(String),

    /// The platform rejected an operation (missing store, aborted
    /// transaction, request failure)
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Key or unique-index conflict
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Caller passed an argument the contract forbids
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The store was disposed; no further calls are accepted
    #[error("store has been disposed")]
    Disposed,
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
