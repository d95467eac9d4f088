//! Explicit registry of synchronized stores, one per channel key.
//!
//! Built once at start-up and handed to whoever needs a store; there is no
//! process-global lookup.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::config::StoreConfig;
use super::synced::SyncedStore;
use crate::channel::Channel;
use crate::error::Result;

/// Channel key identifying a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreKey(String);

impl StoreKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for StoreKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoreKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// Stores sharing one channel, keyed by [`StoreKey`].
pub struct StoreRegistry {
    channel: Arc<dyn Channel>,
    stores: DashMap<StoreKey, Arc<SyncedStore>>,
}

impl StoreRegistry {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self {
            channel,
            stores: DashMap::new(),
        }
    }

    /// Return the store for `config.key`, creating and connecting it on
    /// first use. Later calls for the same key return the same store and
    /// ignore the rest of `config`.
    pub fn get_or_create(&self, config: StoreConfig) -> Arc<SyncedStore> {
        let key = StoreKey::new(config.key.clone());
        if let Some(existing) = self.stores.get(&key) {
            return existing.clone();
        }
        self.stores
            .entry(key)
            .or_insert_with(|| {
                log::debug!("[StoreRegistry] creating store {}", config.key);
                SyncedStore::open(config, self.channel.clone())
            })
            .clone()
    }

    pub fn get(&self, key: &str) -> Option<Arc<SyncedStore>> {
        self.stores.get(key).map(|s| s.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.stores.contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<StoreKey> {
        let mut keys: Vec<StoreKey> = self.stores.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Snapshot of all stores, so callers never hold a map shard while a
    /// store runs observers or talks to the channel.
    fn stores(&self) -> Vec<Arc<SyncedStore>> {
        self.stores.iter().map(|e| e.value().clone()).collect()
    }

    /// Reset every store to `{}`.
    pub fn reset_all(&self) {
        for store in self.stores() {
            store.reset();
        }
    }

    /// Flush every store's outbound queue. Stops at the first failure.
    pub fn flush_all(&self) -> Result<usize> {
        let mut sent = 0;
        for store in self.stores() {
            sent += store.flush_outbound()?;
        }
        Ok(sent)
    }
}

impl fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("keys", &self.keys())
            .finish_non_exhaustive()
    }
}
