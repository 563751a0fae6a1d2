//! GoMarket Cart - Persistent shopping-cart state.
//!
//! Tracks the products a shopper has picked and how many of each, and keeps
//! that list in a key-value store across restarts.
//!
//! # Architecture
//!
//! - [`CartStore`] - Owns the current [`CartState`] and applies mutations
//! - [`CartProvider`] - Loads a cart once and guards access until it is ready
//! - [`KeyValueStore`] - The persistence adapter, with [`MemoryStore`] and
//!   [`FileStore`] bundled
//!
//! Mutations are applied synchronously and in call order. Persistence is
//! write-through and fire-and-forget: every change queues its new snapshot
//! for a single background writer, which stores snapshots one at a time so
//! the newest one always wins. Write failures are logged and published on
//! [`CartStore::persistence_failures`]; they never undo a mutation.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use go_market_cart::{CartConfig, CartStore, FileStore};
//! use go_market_core::{NewLineItem, Price, ProductId};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CartConfig::from_env()?;
//! let cart = CartStore::open(Arc::new(FileStore::new(&config.data_dir)), config).await?;
//!
//! cart.add_to_cart(NewLineItem::new(
//!     ProductId::parse("p1")?,
//!     "Shirt",
//!     "https://img.example/p1.png",
//!     Price::from_cents(1000)?,
//! ));
//! cart.increment("p1");
//! assert_eq!(cart.products().total_quantity(), 2);
//!
//! cart.flush().await;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod provider;
pub mod state;
pub mod storage;
pub mod store;
mod writer;

pub use config::{CartConfig, ConfigError};
pub use error::{CartError, Result};
pub use provider::CartProvider;
pub use state::{CartState, DuplicateItemError};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use store::CartStore;
pub use writer::PersistenceFailure;
