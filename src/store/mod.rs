//! Synchronized stores.
//!
//! A [`SyncedStore`] mirrors one value with the background context under a
//! channel key; a [`StoreRegistry`] owns the stores of a process.

pub mod config;
pub mod observer;
pub mod outbound;
pub mod registry;
pub mod synced;

pub use config::{LocalValidation, StoreConfig, WireFormat};
pub use observer::{Observer, Subscribers, SubscriptionId};
pub use outbound::{OutboundPump, OutboundQueue};
pub use registry::{StoreKey, StoreRegistry};
pub use synced::{InboundOutcome, SyncedStore};
