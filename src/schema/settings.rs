//! The application settings schema.

use super::{Schema, TextRule};

/// Channel key the settings store publishes under.
pub const SETTINGS_STORE_KEY: &str = "SettingsStore";

/// Bugzilla API key. Held in memory only, never persisted to disk.
pub const BUGZILLA_API_KEY: &str = "bugzillaApiKey";

/// Schema for the application settings: every field optional, empty
/// strings allowed.
pub fn settings_schema() -> Schema {
    Schema::new().field(BUGZILLA_API_KEY, TextRule::any())
}
