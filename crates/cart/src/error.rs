//! Cart error types.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors returned by the cart store and provider.
#[derive(Debug, Error)]
pub enum CartError {
    /// The cart was used before the provider finished loading it.
    #[error("cart must be used within an initialized cart context")]
    NotInitialized,

    /// The persisted cart could not be parsed.
    #[error("persisted cart is malformed: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// The persistence adapter failed while loading.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;
