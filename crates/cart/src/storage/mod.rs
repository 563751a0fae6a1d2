//! Persistence adapter abstraction.
//!
//! The cart only needs an asynchronous string store keyed by name. Two
//! adapters are bundled:
//! - [`MemoryStore`] - In-process map, for tests and ephemeral sessions
//! - [`FileStore`] - One file per key in a data directory

mod file;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors raised by a persistence adapter.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend cannot currently serve requests.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The value could not be encoded for storage.
    #[error("encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Asynchronous key-value persistence backend.
///
/// Implementations must be safe to share between the cart store and its
/// background writer.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, or `None` if it was never set.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
}
