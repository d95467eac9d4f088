//! The settings value and its channel envelope.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A mapping of named settings to string values.
///
/// An absent key is an absent setting. Keys are kept sorted, so two values
/// with the same entries compare equal no matter the order they were
/// inserted in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsValue(BTreeMap<String, String>);

impl SettingsValue {
    /// The canonical empty value `{}`.
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Get a setting by name.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Set a setting, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Remove a setting, returning the previous value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate settings in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Deep copy into a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }
}

impl FromIterator<(String, String)> for SettingsValue {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, String>> for SettingsValue {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

/// Named wrapper used on the channel when several stores share it.
///
/// Wire shape: `{"settings": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub settings: SettingsValue,
}

/// Field name of the envelope payload.
pub const ENVELOPE_FIELD: &str = "settings";

impl Envelope {
    pub fn new(settings: SettingsValue) -> Self {
        Self { settings }
    }

    pub fn to_json(&self) -> Value {
        let mut obj = serde_json::Map::new();
        obj.insert(ENVELOPE_FIELD.to_string(), self.settings.to_json());
        Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_is_canonical() {
        assert_eq!(SettingsValue::empty().to_json(), json!({}));
        assert_eq!(SettingsValue::default(), SettingsValue::empty());
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let a = SettingsValue::empty().with("a", "1").with("b", "2");
        let b = SettingsValue::empty().with("b", "2").with("a", "1");
        assert_eq!(a, b);
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let v = SettingsValue::empty().with("bugzillaApiKey", "abc");
        assert_eq!(serde_json::to_value(&v).unwrap(), json!({"bugzillaApiKey": "abc"}));
        assert_eq!(v.to_json(), json!({"bugzillaApiKey": "abc"}));
    }

    #[test]
    fn test_set_and_remove() {
        let mut v = SettingsValue::empty();
        assert_eq!(v.set("k", "1"), None);
        assert_eq!(v.set("k", "2"), Some("1".to_string()));
        assert_eq!(v.get("k"), Some("2"));
        assert_eq!(v.remove("k"), Some("2".to_string()));
        assert!(v.is_empty());
    }

    #[test]
    fn test_envelope_wire_shape() {
        let env = Envelope::new(SettingsValue::empty().with("bugzillaApiKey", ""));
        assert_eq!(env.to_json(), json!({"settings": {"bugzillaApiKey": ""}}));
        assert_eq!(serde_json::to_value(&env).unwrap(), env.to_json());
    }
}
