//! Declarative field rules.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationIssue;

/// Constraints on a string-valued setting.
///
/// Every setting is optional; these rules only apply when the field is
/// present. With `allow_empty`, the empty string is accepted even when it
/// falls below `min_len`, so a length-checked key can still be cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRule {
    #[serde(default)]
    pub min_len: Option<usize>,
    #[serde(default)]
    pub max_len: Option<usize>,
    #[serde(default = "default_allow_empty")]
    pub allow_empty: bool,
}

fn default_allow_empty() -> bool {
    true
}

impl Default for TextRule {
    fn default() -> Self {
        Self {
            min_len: None,
            max_len: None,
            allow_empty: true,
        }
    }
}

impl TextRule {
    /// Any string, including the empty string.
    pub fn any() -> Self {
        Self::default()
    }

    /// Exactly `len` characters, or empty.
    pub fn exact_or_empty(len: usize) -> Self {
        Self {
            min_len: Some(len),
            max_len: Some(len),
            allow_empty: true,
        }
    }

    /// Check a string against the rule.
    pub fn check_str(&self, field: &str, s: &str) -> Result<(), ValidationIssue> {
        if s.is_empty() && self.allow_empty {
            return Ok(());
        }
        let len = s.chars().count();
        if let Some(min) = self.min_len {
            if len < min {
                return Err(ValidationIssue::TooShort { field: field.to_string(), min, len });
            }
        }
        if let Some(max) = self.max_len {
            if len > max {
                return Err(ValidationIssue::TooLong { field: field.to_string(), max, len });
            }
        }
        Ok(())
    }
}

/// A named, optional, string-valued field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub rule: TextRule,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, rule: TextRule) -> Self {
        Self { name: name.into(), rule }
    }

    /// Validate an untyped candidate for this field, returning the string on success.
    pub(crate) fn check_value<'a>(&self, value: &'a Value) -> Result<&'a str, ValidationIssue> {
        match value {
            Value::String(s) => {
                self.rule.check_str(&self.name, s)?;
                Ok(s.as_str())
            }
            other => Err(ValidationIssue::WrongType {
                field: self.name.clone(),
                found: json_type_name(other),
            }),
        }
    }
}

/// Short JSON type name for diagnostics.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_any_accepts_everything_stringy() {
        let rule = TextRule::any();
        assert!(rule.check_str("k", "").is_ok());
        assert!(rule.check_str("k", "abc").is_ok());
    }

    #[test]
    fn test_exact_or_empty() {
        let rule = TextRule::exact_or_empty(4);
        assert!(rule.check_str("k", "").is_ok());
        assert!(rule.check_str("k", "abcd").is_ok());
        assert_eq!(
            rule.check_str("k", "abc"),
            Err(ValidationIssue::TooShort { field: "k".into(), min: 4, len: 3 })
        );
        assert_eq!(
            rule.check_str("k", "abcde"),
            Err(ValidationIssue::TooLong { field: "k".into(), max: 4, len: 5 })
        );
    }

    #[test]
    fn test_empty_rejected_when_not_allowed() {
        let rule = TextRule { min_len: Some(1), max_len: None, allow_empty: false };
        assert!(rule.check_str("k", "").is_err());
    }

    #[test]
    fn test_field_rejects_non_strings() {
        let field = FieldSpec::new("bugzillaApiKey", TextRule::any());
        assert_eq!(field.check_value(&json!("x")), Ok("x"));
        assert_eq!(
            field.check_value(&json!(123)),
            Err(ValidationIssue::WrongType { field: "bugzillaApiKey".into(), found: "number" })
        );
        assert!(field.check_value(&Value::Null).is_err());
    }

    #[test]
    fn test_rule_deserializes_with_defaults() {
        let rule: TextRule = serde_json::from_value(json!({"max_len": 8})).unwrap();
        assert_eq!(rule, TextRule { min_len: None, max_len: Some(8), allow_empty: true });
    }
}
