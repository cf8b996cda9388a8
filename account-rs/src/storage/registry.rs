//! One store per database path
//!
//! Opening the same SQLite file twice in one process gives two pools
//! fighting over the same locks. The registry hands back the store that is
//! already open for a path and serialises first use, so concurrent callers
//! never open duplicates. It is created once in the composition root and
//! passed down; there is no global instance.

use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use super::AccountStore;
use crate::config::StorageConfig;
use crate::error::Result;

#[derive(Default)]
pub struct StoreRegistry {
    stores: Mutex<HashMap<String, AccountStore>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the store for `config.database_path`, opening it on first use.
    ///
    /// In-memory databases are private to each call and are never shared.
    pub async fn open(&self, config: &StorageConfig) -> Result<AccountStore> {
        if config.is_memory() {
            return AccountStore::open(config).await;
        }

        // Held across the open so a second caller waits instead of racing
        let mut stores = self.stores.lock().await;
        if let Some(store) = stores.get(&config.database_path) {
            debug!("Reusing account store at {}", config.database_path);
            return Ok(store.clone());
        }

        let store = AccountStore::open(config).await?;
        stores.insert(config.database_path.clone(), store.clone());
        Ok(store)
    }

    pub async fn len(&self) -> usize {
        self.stores.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.stores.lock().await.is_empty()
    }

    /// Close and forget every store.
    pub async fn close_all(&self) {
        let mut stores = self.stores.lock().await;
        for (_, store) in stores.drain() {
            store.close().await;
        }
    }
}
