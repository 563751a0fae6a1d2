//! Deferred cart initialization.
//!
//! Application wiring often hands out the cart before it has been loaded.
//! [`CartProvider`] holds the adapter and configuration, loads the cart once,
//! and refuses to hand out a [`CartStore`] until that has happened.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::instrument;

use crate::config::CartConfig;
use crate::error::{CartError, Result};
use crate::state::CartState;
use crate::store::CartStore;
use crate::storage::KeyValueStore;

/// Owner of a cart that may not be loaded yet.
pub struct CartProvider {
    store: Arc<dyn KeyValueStore>,
    config: CartConfig,
    cart: OnceCell<CartStore>,
}

impl CartProvider {
    /// Create a provider; nothing is loaded until [`CartProvider::initialize`].
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, config: CartConfig) -> Self {
        Self {
            store,
            config,
            cart: OnceCell::new(),
        }
    }

    /// Load the cart, or return it if already loaded.
    ///
    /// Concurrent callers share a single load. A failed load leaves the
    /// provider uninitialized, so a later call tries again.
    ///
    /// # Errors
    ///
    /// Returns the error from [`CartStore::open`].
    #[instrument(skip(self), fields(key = %self.config.storage_key))]
    pub async fn initialize(&self) -> Result<&CartStore> {
        self.cart
            .get_or_try_init(|| CartStore::open(Arc::clone(&self.store), self.config.clone()))
            .await
    }

    /// The loaded cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInitialized`] if called before
    /// [`CartProvider::initialize`] has completed.
    pub fn cart(&self) -> Result<&CartStore> {
        self.cart.get().ok_or(CartError::NotInitialized)
    }

    /// Whether the cart has been loaded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.cart.initialized()
    }

    /// The current snapshot, empty while the cart is still loading.
    #[must_use]
    pub fn products(&self) -> CartState {
        self.cart
            .get()
            .map_or_else(CartState::empty, CartStore::products)
    }
}

impl std::fmt::Debug for CartProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartProvider")
            .field("config", &self.config)
            .field("cart", &self.cart.get())
            .finish_non_exhaustive()
    }
}
