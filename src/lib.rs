//! # settings-sync
//!
//! A schema-validated reactive settings store kept consistent with a value
//! held by a separate background context (a shared persistence/broadcast
//! hub), without feedback loops and without accepting malformed data.
//!
//! - [`schema`]: declarative validation of untrusted settings values.
//! - [`compare`]: structural equality gating inbound updates.
//! - [`channel`]: the keyed publish/subscribe collaborator and its adapter.
//! - [`store`]: the synchronized store, its outbound queue and registry.
//! - [`toast`]: newest-first notification log.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use settings_sync::channel::MemoryChannel;
//! use settings_sync::schema::SettingsValue;
//! use settings_sync::store::{StoreConfig, StoreRegistry};
//!
//! let hub = Arc::new(MemoryChannel::new());
//! let registry = StoreRegistry::new(hub.client());
//! let settings = registry.get_or_create(StoreConfig::default());
//!
//! settings.save(SettingsValue::empty().with("bugzillaApiKey", "abc")).unwrap();
//! registry.flush_all().unwrap();
//!
//! assert_eq!(hub.last("SettingsStore"), Some(serde_json::json!({"bugzillaApiKey": "abc"})));
//! ```

pub mod channel;
pub mod compare;
pub mod error;
pub mod schema;
pub mod store;
pub mod toast;

pub use channel::{Channel, MemoryChannel};
pub use error::{ChannelError, StoreError, ValidationError};
pub use schema::settings::{settings_schema, SETTINGS_STORE_KEY};
pub use schema::{Schema, SettingsValue, Validation};
pub use store::{StoreConfig, StoreRegistry, SyncedStore};
pub use toast::{NewToast, Toast, ToastLog};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
