//! Keyed publish/subscribe channel to the background context.
//!
//! The transport itself is an external collaborator; the store only needs
//! the two operations of [`Channel`]. [`MemoryChannel`] is an in-process
//! implementation that behaves like the background hub: it keeps the last
//! value per key and rebroadcasts every put to the other endpoints.

pub mod adapter;
pub mod memory;

use std::sync::Arc;

use serde_json::Value;

pub use crate::error::ChannelError;
pub use adapter::ChannelAdapter;
pub use memory::{ChannelClient, MemoryChannel};

/// Callback invoked with each value published under a key.
///
/// The value is already deserialized but untrusted.
pub type ListenCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// Keyed publish/subscribe medium.
pub trait Channel: Send + Sync {
    /// Register a handler for values published under `key`.
    fn listen(&self, key: &str, callback: ListenCallback);

    /// Publish a value under `key`. Fire-and-forget: `Ok` only means the
    /// transport accepted the value.
    fn put(&self, key: &str, value: Value) -> Result<(), ChannelError>;
}
