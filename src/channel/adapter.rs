//! Boundary between a store and its channel.
//!
//! Outbound, the adapter serializes a deep copy of the value into the
//! configured wire shape and hands it to [`Channel::put`]. Inbound, it runs
//! the untrusted payload through the schema for that wire shape.

use std::sync::Arc;

use serde_json::Value;

use super::{Channel, ChannelError, ListenCallback};
use crate::schema::{Envelope, Schema, SettingsValue, Validation};
use crate::store::config::WireFormat;

/// Binds a store key and wire format to a channel.
#[derive(Clone)]
pub struct ChannelAdapter {
    channel: Arc<dyn Channel>,
    key: String,
    format: WireFormat,
}

impl ChannelAdapter {
    pub fn new(channel: Arc<dyn Channel>, key: impl Into<String>, format: WireFormat) -> Self {
        Self {
            channel,
            key: key.into(),
            format,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Serialize a value into its wire shape.
    pub fn encode(&self, value: &SettingsValue) -> Result<Value, ChannelError> {
        let encoded = match self.format {
            WireFormat::Raw => serde_json::to_value(value)?,
            WireFormat::Enveloped => serde_json::to_value(Envelope::new(value.clone()))?,
        };
        Ok(encoded)
    }

    /// Validate an inbound payload against `schema`.
    pub fn decode(&self, schema: &Schema, payload: &Value) -> Validation {
        match self.format {
            WireFormat::Raw => schema.validate(payload),
            WireFormat::Enveloped => schema.validate_envelope(payload),
        }
    }

    /// Encode and publish a value under this adapter's key.
    pub fn send(&self, value: &SettingsValue) -> Result<(), ChannelError> {
        let payload = self.encode(value)?;
        log::trace!("[ChannelAdapter] put {} -> {}", self.key, payload);
        self.channel.put(&self.key, payload)
    }

    /// Register an inbound handler under this adapter's key.
    pub fn listen(&self, callback: ListenCallback) {
        self.channel.listen(&self.key, callback);
    }
}

impl std::fmt::Debug for ChannelAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelAdapter")
            .field("key", &self.key)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}
