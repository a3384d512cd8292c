//! Durable storage of tracked items.
//!
//! Every backend serializes its own operations behind a single lock, and
//! [`Store::update`] holds that lock across the whole load, mutate and save
//! sequence. Callers that need read-modify-write semantics must go through
//! `update` rather than pairing `load` with `save`.

mod json;
mod schema;
mod sqlite;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::StoreBackend;
use crate::error::Result;
use crate::models::TrackedItem;

pub use json::JsonFileStore;
pub use sqlite::SqliteStore;

/// Mutates the loaded collection in place and returns whether it should be
/// persisted.
pub type Mutation<'a> = Box<dyn FnOnce(&mut Vec<TrackedItem>) -> bool + Send + 'a>;

#[async_trait]
pub trait Store: Send + Sync {
    /// All items in insertion order; empty when nothing has been stored yet.
    async fn load(&self) -> Result<Vec<TrackedItem>>;

    /// Replaces the stored collection atomically.
    async fn save(&self, items: &[TrackedItem]) -> Result<()>;

    /// Runs `mutate` against a fresh load while holding the store lock.
    async fn update(&self, mutate: Mutation<'_>) -> Result<()>;
}

pub async fn open(backend: StoreBackend, path: &Path) -> Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match backend {
        StoreBackend::Json => Arc::new(JsonFileStore::new(path)),
        StoreBackend::Sqlite => Arc::new(SqliteStore::new(path).await?),
    };
    Ok(store)
}
