//! The cart store.
//!
//! [`CartStore`] owns the authoritative [`CartState`]. Each mutation runs
//! inside one critical section of a `watch` channel: compute the next
//! snapshot from the current one, serialize that same snapshot, queue it
//! for persistence and publish it to subscribers. Callers never wait on
//! storage.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use go_market_core::NewLineItem;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, instrument};

use crate::config::CartConfig;
use crate::error::Result;
use crate::state::CartState;
use crate::storage::KeyValueStore;
use crate::writer::{PersistenceFailure, WriteQueue};

/// Shared handle to the cart.
///
/// Cloning is cheap and every clone sees the same cart. Obtaining a
/// `CartStore` requires loading it first (see [`CartStore::open`]), so any
/// code holding one works against an initialized cart.
///
/// Mutations on a product id that is not in the cart are silent no-ops:
/// nothing changes, nothing is written and subscribers are not notified.
/// Each mutator returns whether the cart changed.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<Inner>,
}

struct Inner {
    key: String,
    state: watch::Sender<CartState>,
    revision: AtomicU64,
    writer: WriteQueue,
}

impl CartStore {
    /// Load the cart from `store` and start its background writer.
    ///
    /// A missing key yields an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the adapter fails, or
    /// `CartError::Corrupt` if the persisted value cannot be parsed. A
    /// malformed cart is never replaced with an empty one.
    #[instrument(skip(store, config), fields(key = %config.storage_key))]
    pub async fn open(store: Arc<dyn KeyValueStore>, config: CartConfig) -> Result<Self> {
        let state = match store.get(&config.storage_key).await? {
            Some(raw) => CartState::from_json(&raw).map_err(|e| {
                error!(error = %e, "Persisted cart is malformed");
                e
            })?,
            None => {
                debug!("No persisted cart, starting empty");
                CartState::empty()
            }
        };

        info!(
            lines = state.len(),
            units = state.total_quantity(),
            "Cart loaded"
        );

        let writer = WriteQueue::spawn(store, config.storage_key.clone(), config.coalesce_writes);
        let (state, _) = watch::channel(state);

        Ok(Self {
            inner: Arc::new(Inner {
                key: config.storage_key,
                state,
                revision: AtomicU64::new(0),
                writer,
            }),
        })
    }

    /// The current snapshot.
    #[must_use]
    pub fn products(&self) -> CartState {
        self.inner.state.borrow().clone()
    }

    /// Add a product with a quantity of one.
    ///
    /// Any quantity on the input is ignored. If the product is already in
    /// the cart its existing line gains one unit instead.
    pub fn add_to_cart(&self, item: impl Into<NewLineItem>) -> bool {
        let item = item.into();
        let id = item.id.clone();
        self.apply("add_to_cart", id.as_str(), |state| state.with_added(item))
    }

    /// Add one unit of `id`.
    pub fn increment(&self, id: &str) -> bool {
        self.apply("increment", id, |state| state.with_incremented(id))
    }

    /// Remove one unit of `id`, dropping the line when it was the last one.
    pub fn decrement(&self, id: &str) -> bool {
        self.apply("decrement", id, |state| state.with_decremented(id))
    }

    /// Subscribe to cart changes.
    ///
    /// The receiver starts at the current snapshot and is notified after
    /// every mutation that changed the cart.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state.subscribe()
    }

    /// Subscribe to failed persistence writes.
    #[must_use]
    pub fn persistence_failures(&self) -> broadcast::Receiver<PersistenceFailure> {
        self.inner.writer.subscribe_failures()
    }

    /// Number of mutations that changed the cart since it was opened.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.inner.revision.load(Ordering::Acquire)
    }

    /// The key the cart is persisted under.
    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.inner.key
    }

    /// Wait for every write scheduled so far to complete.
    ///
    /// Failed writes count as completed; they are reported through
    /// [`CartStore::persistence_failures`].
    pub async fn flush(&self) {
        self.inner.writer.flush().await;
    }

    fn apply(
        &self,
        op: &'static str,
        id: &str,
        transition: impl FnOnce(&CartState) -> Option<CartState>,
    ) -> bool {
        self.inner.state.send_if_modified(|state| {
            let Some(next) = transition(state) else {
                debug!(op, id, "Cart unchanged");
                return false;
            };

            let revision = self.inner.revision.fetch_add(1, Ordering::AcqRel) + 1;
            self.persist(op, revision, next.to_json());

            debug!(op, id, revision, lines = next.len(), "Cart updated");
            *state = next;
            true
        })
    }

    /// Queue an encoded snapshot, or report it as failed if encoding did.
    fn persist(&self, op: &'static str, revision: u64, encoded: serde_json::Result<String>) {
        match encoded {
            Ok(payload) => self.inner.writer.schedule(revision, payload),
            Err(e) => {
                error!(op, revision, error = %e, "Failed to serialize cart");
                self.inner.writer.report_failure(revision, e.into());
            }
        }
    }
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("key", &self.inner.key)
            .field("revision", &self.revision())
            .field("lines", &self.inner.state.borrow().len())
            .finish_non_exhaustive()
    }
}
