//! In-process channel hub.
//!
//! Stands in for the background context in tests and the demo binary:
//! one [`MemoryChannel`] per process, one [`ChannelClient`] per foreground
//! context.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use super::{Channel, ChannelError, ListenCallback};

/// Endpoint id of the hub itself.
const HUB_ENDPOINT: u64 = 0;

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

/// Values published under one key.
#[derive(Debug, Default)]
struct KeyLog {
    values: VecDeque<Value>,
    puts: usize,
}

/// Last-value-per-key broadcast hub living in the current process.
///
/// The hub stands in for the background context. Foreground contexts talk
/// to it through [`ChannelClient`] endpoints obtained from
/// [`client`](Self::client). A put through an endpoint is recorded, becomes
/// the key's last value and is delivered synchronously, in registration
/// order, to the listeners of every *other* endpoint. The hub's own
/// [`Channel`] impl is one more endpoint, used by background-side code.
///
/// Every put is kept in the key's history. A hub built with
/// [`new`](Self::new) never forgets a value, so long-running programs should
/// use [`with_history_limit`](Self::with_history_limit).
#[derive(Default)]
pub struct MemoryChannel {
    listeners: Mutex<HashMap<String, Vec<(u64, ListenCallback)>>>,
    history: Mutex<HashMap<String, KeyLog>>,
    history_limit: Option<usize>,
    next_endpoint: AtomicU64,
    closed: AtomicBool,
    #[cfg(test)]
    fail_next: Mutex<Option<String>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A hub that keeps at most `limit` values per key (at least one, so
    /// [`last`](Self::last) keeps working). Older values are dropped first.
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            history_limit: Some(limit.max(1)),
            ..Self::default()
        }
    }

    /// Open a new endpoint for a foreground context.
    pub fn client(self: &Arc<Self>) -> Arc<ChannelClient> {
        let id = self.next_endpoint.fetch_add(1, Ordering::Relaxed) + 1;
        Arc::new(ChannelClient { hub: self.clone(), id })
    }

    /// The most recent value published under `key`.
    pub fn last(&self, key: &str) -> Option<Value> {
        self.history.lock().get(key).and_then(|log| log.values.back().cloned())
    }

    /// Values published under `key`, oldest first. Under a history limit
    /// only the most recent ones are kept.
    pub fn history(&self, key: &str) -> Vec<Value> {
        self.history
            .lock()
            .get(key)
            .map(|log| log.values.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of values ever published under `key`.
    pub fn put_count(&self, key: &str) -> usize {
        self.history.lock().get(key).map_or(0, |log| log.puts)
    }

    /// Number of listeners registered for `key` across all endpoints.
    pub fn listener_count(&self, key: &str) -> usize {
        self.listeners.lock().get(key).map_or(0, Vec::len)
    }

    /// Stop accepting values. Later puts fail with [`ChannelError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.listeners.lock().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Deliver `value` to every listener of `key` without recording it, as
    /// if an unknown context had published it.
    pub fn deliver(&self, key: &str, value: Value) {
        self.dispatch(None, key, value);
    }

    fn register(&self, endpoint: u64, key: &str, callback: ListenCallback) {
        if self.is_closed() {
            log::debug!("[MemoryChannel] listen on closed channel for {key}, ignoring");
            return;
        }
        self.listeners
            .lock()
            .entry(key.to_string())
            .or_default()
            .push((endpoint, callback));
    }

    fn publish(&self, endpoint: u64, key: &str, value: Value) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        if let Some(message) = self.take_injected_failure() {
            return Err(ChannelError::Transport(message));
        }

        {
            let mut history = self.history.lock();
            let entries = history.entry(key.to_string()).or_default();
            if entries.values.back() == Some(&value) {
                log::trace!("[MemoryChannel] {key}: value unchanged since last put");
            }
            entries.values.push_back(value.clone());
            entries.puts += 1;
            if let Some(limit) = self.history_limit {
                while entries.values.len() > limit {
                    entries.values.pop_front();
                }
            }
        }

        self.dispatch(Some(endpoint), key, value);
        Ok(())
    }

    // Locks are released before delivery so listeners may call back in.
    fn dispatch(&self, from: Option<u64>, key: &str, value: Value) {
        let callbacks: Vec<ListenCallback> = self
            .listeners
            .lock()
            .get(key)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(endpoint, _)| Some(*endpoint) != from)
                    .map(|(_, cb)| cb.clone())
                    .collect()
            })
            .unwrap_or_default();
        for cb in callbacks {
            cb(value.clone());
        }
    }

    /// Make the next put fail with a transport error.
    #[cfg(test)]
    pub(crate) fn fail_next_put(&self, message: impl Into<String>) {
        *self.fail_next.lock() = Some(message.into());
    }

    #[cfg(test)]
    fn take_injected_failure(&self) -> Option<String> {
        self.fail_next.lock().take()
    }

    #[cfg(not(test))]
    fn take_injected_failure(&self) -> Option<String> {
        None
    }
}

impl Channel for MemoryChannel {
    fn listen(&self, key: &str, callback: ListenCallback) {
        self.register(HUB_ENDPOINT, key, callback);
    }

    fn put(&self, key: &str, value: Value) -> Result<(), ChannelError> {
        self.publish(HUB_ENDPOINT, key, value)
    }
}

impl std::fmt::Debug for MemoryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self.listeners.lock().keys().cloned().collect();
        f.debug_struct("MemoryChannel")
            .field("keys", &keys)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// One context's connection to a [`MemoryChannel`].
///
/// Values put through a client never come back to that client's listeners.
#[derive(Debug, Clone)]
pub struct ChannelClient {
    hub: Arc<MemoryChannel>,
    id: u64,
}

impl ChannelClient {
    pub fn hub(&self) -> &Arc<MemoryChannel> {
        &self.hub
    }
}

impl Channel for ChannelClient {
    fn listen(&self, key: &str, callback: ListenCallback) {
        self.hub.register(self.id, key, callback);
    }

    fn put(&self, key: &str, value: Value) -> Result<(), ChannelError> {
        self.hub.publish(self.id, key, value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
