//! Integration tests for the GoMarket cart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p go-market-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_scenarios` - Mutation semantics through the public store API
//! - `persistence` - Load/save behaviour against recording, gated, failing
//!   and file-backed adapters
//!
//! This crate also provides the test adapters those suites share.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use go_market_cart::{CartState, KeyValueStore, MemoryStore, StorageError};
use go_market_core::{NewLineItem, Price, ProductId};
use tokio::sync::Semaphore;

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A candidate line priced in whole units.
///
/// # Panics
///
/// Panics if `id` is empty.
#[must_use]
#[allow(clippy::expect_used)]
pub fn product(id: &str, title: &str, price: i64) -> NewLineItem {
    NewLineItem::new(
        ProductId::parse(id).expect("test product id must not be empty"),
        title,
        format!("https://img.example/{id}.png"),
        Price::from_cents(price * 100).expect("test price must not be negative"),
    )
}

/// JSON blob for a single persisted line.
#[must_use]
pub fn blob(id: &str, quantity: u32) -> String {
    serde_json::json!([{
        "id": id,
        "title": "Shirt",
        "image_url": format!("https://img.example/{id}.png"),
        "price": 10,
        "quantity": quantity,
    }])
    .to_string()
}

/// A memory store that records every value written to it.
///
/// Writes can be held back with [`RecordingStore::gated`]: each `set` then
/// waits for a permit from [`RecordingStore::release`].
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    writes: Mutex<Vec<String>>,
    gate: Option<Semaphore>,
    waiting: AtomicUsize,
}

impl RecordingStore {
    /// An empty store that writes immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding `value` under `key`.
    #[must_use]
    pub fn with_entry(key: &str, value: impl Into<String>) -> Self {
        Self {
            inner: MemoryStore::with_entry(key, value),
            ..Self::default()
        }
    }

    /// An empty store whose writes block until released.
    #[must_use]
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    /// Let `n` blocked writes through.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Number of writes currently blocked on the gate.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Every value written so far, oldest first.
    #[must_use]
    pub fn writes(&self) -> Vec<String> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every value written so far, parsed as cart snapshots.
    ///
    /// # Panics
    ///
    /// Panics if a written value is not a valid cart.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn written_states(&self) -> Vec<CartState> {
        self.writes()
            .iter()
            .map(|raw| CartState::from_json(raw).expect("written cart must parse"))
            .collect()
    }
}

#[async_trait]
impl KeyValueStore for RecordingStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        if let Some(gate) = &self.gate {
            self.waiting.fetch_add(1, Ordering::SeqCst);
            let permit = gate
                .acquire()
                .await
                .map_err(|e| StorageError::Unavailable(e.to_string()))?;
            permit.forget();
            self.waiting.fetch_sub(1, Ordering::SeqCst);
        }

        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value.clone());
        self.inner.set(key, value).await
    }
}

/// A store that can be read but rejects every write.
#[derive(Debug, Default)]
pub struct ReadOnlyStore {
    inner: MemoryStore,
    rejected: AtomicUsize,
}

impl ReadOnlyStore {
    /// A read-only store holding `value` under `key`.
    #[must_use]
    pub fn with_entry(key: &str, value: impl Into<String>) -> Self {
        Self {
            inner: MemoryStore::with_entry(key, value),
            rejected: AtomicUsize::new(0),
        }
    }

    /// Number of writes rejected so far.
    #[must_use]
    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for ReadOnlyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key).await
    }

    async fn set(&self, _key: &str, _value: String) -> Result<(), StorageError> {
        self.rejected.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Unavailable("store is read-only".to_string()))
    }
}

/// A store whose reads fail.
#[derive(Debug, Default)]
pub struct UnavailableStore;

#[async_trait]
impl KeyValueStore for UnavailableStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("backend offline".to_string()))
    }

    async fn set(&self, _key: &str, _value: String) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("backend offline".to_string()))
    }
}
