//! Store configuration.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::schema::settings::{settings_schema, SETTINGS_STORE_KEY};
use crate::schema::{Schema, UnknownFields};

/// Whether `save` checks the value against the schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalValidation {
    /// Local callers are trusted; `save` stores whatever it is given.
    #[default]
    Trusted,
    /// `save` rejects values the schema does not accept.
    Strict,
}

/// Shape of the value on the channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// The settings object itself.
    #[default]
    Raw,
    /// `{"settings": {...}}`.
    Enveloped,
}

/// Configuration for one synchronized store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Channel key the store listens and publishes under.
    #[serde(default = "default_key")]
    pub key: String,
    #[serde(default = "settings_schema")]
    pub schema: Schema,
    #[serde(default)]
    pub local_validation: LocalValidation,
    #[serde(default)]
    pub wire_format: WireFormat,
}

fn default_key() -> String {
    SETTINGS_STORE_KEY.to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key: default_key(),
            schema: settings_schema(),
            local_validation: LocalValidation::default(),
            wire_format: WireFormat::default(),
        }
    }
}

impl StoreConfig {
    /// Config for the application settings store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Config for a store under another key and schema.
    pub fn with_key(key: impl Into<String>, schema: Schema) -> Self {
        Self {
            key: key.into(),
            schema,
            ..Self::default()
        }
    }

    pub fn local_validation(mut self, policy: LocalValidation) -> Self {
        self.local_validation = policy;
        self
    }

    /// Shorthand for `local_validation(LocalValidation::Strict)`.
    pub fn strict(self) -> Self {
        self.local_validation(LocalValidation::Strict)
    }

    pub fn wire_format(mut self, format: WireFormat) -> Self {
        self.wire_format = format;
        self
    }

    pub fn unknown_fields(mut self, policy: UnknownFields) -> Self {
        self.schema.unknown_fields = policy;
        self
    }

    /// Parse a config from JSON text.
    pub fn from_json(text: &str) -> Result<Self, StoreError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| StoreError::Config(e.to_string()))?;
        if config.key.is_empty() {
            return Err(StoreError::Config("store key must not be empty".to_string()));
        }
        Ok(config)
    }
}
