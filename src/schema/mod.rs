//! Schema validation for settings values.
//!
//! A [`Schema`] is a declarative list of optional string fields plus a
//! policy for fields it does not know. Validation of untrusted data never
//! fails loudly: [`Schema::validate`] always returns a [`Validation`], which
//! is either the typed value or the reasons it was refused.
//!
//! # Unknown fields
//!
//! By default unknown fields are stripped so that newer senders on the same
//! channel do not get their whole value rejected by an older reader.
//! [`UnknownFields::Reject`] turns them into validation failures instead.

pub mod field;
pub mod settings;
pub mod value;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ValidationError, ValidationIssue};

pub use field::{FieldSpec, TextRule};
pub use value::{Envelope, SettingsValue, ENVELOPE_FIELD};

use field::json_type_name;

/// What to do with fields the schema does not declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFields {
    /// Drop them from the validated value.
    #[default]
    Strip,
    /// Fail validation.
    Reject,
}

/// Result of validating an untrusted candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid(SettingsValue),
    Invalid(ValidationError),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Convert into a `Result`, for callers that want `?`.
    pub fn into_result(self) -> Result<SettingsValue, ValidationError> {
        match self {
            Self::Valid(v) => Ok(v),
            Self::Invalid(e) => Err(e),
        }
    }

    /// The validated value, if any.
    pub fn ok(self) -> Option<SettingsValue> {
        self.into_result().ok()
    }
}

/// Declarative description of a valid settings value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub unknown_fields: UnknownFields,
}

impl Schema {
    /// A schema with no fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an optional string field (builder pattern).
    pub fn field(mut self, name: impl Into<String>, rule: TextRule) -> Self {
        self.fields.push(FieldSpec::new(name, rule));
        self
    }

    /// Set the unknown-field policy (builder pattern).
    pub fn unknown_fields(mut self, policy: UnknownFields) -> Self {
        self.unknown_fields = policy;
        self
    }

    /// Look up a field by name.
    pub fn field_spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate an untrusted JSON candidate.
    ///
    /// All issues are collected, not just the first.
    pub fn validate(&self, candidate: &Value) -> Validation {
        let obj = match candidate {
            Value::Object(obj) => obj,
            other => {
                return Validation::Invalid(ValidationError::single(
                    ValidationIssue::NotAnObject { found: json_type_name(other) },
                ))
            }
        };
        self.validate_object(obj)
    }

    /// Validate an envelope `{"settings": {...}}` and return its payload.
    ///
    /// The `settings` member is required.
    pub fn validate_envelope(&self, candidate: &Value) -> Validation {
        let obj = match candidate {
            Value::Object(obj) => obj,
            other => {
                return Validation::Invalid(ValidationError::single(
                    ValidationIssue::NotAnObject { found: json_type_name(other) },
                ))
            }
        };
        match obj.get(ENVELOPE_FIELD) {
            Some(inner) => self.validate(inner),
            None => Validation::Invalid(ValidationError::single(
                ValidationIssue::MissingEnvelopeField { field: ENVELOPE_FIELD.to_string() },
            )),
        }
    }

    /// Check an already-typed value against the schema.
    ///
    /// Under [`UnknownFields::Strip`] unknown keys are tolerated here, since
    /// stripping would silently change a value the caller owns.
    pub fn check(&self, value: &SettingsValue) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        for (key, s) in value.iter() {
            match self.field_spec(key) {
                Some(spec) => {
                    if let Err(issue) = spec.rule.check_str(&spec.name, s) {
                        issues.push(issue);
                    }
                }
                None if self.unknown_fields == UnknownFields::Reject => {
                    issues.push(ValidationIssue::UnknownField { field: key.to_string() });
                }
                None => {}
            }
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    fn validate_object(&self, obj: &Map<String, Value>) -> Validation {
        let mut issues = Vec::new();
        let mut out = SettingsValue::empty();

        for (key, value) in obj {
            match self.field_spec(key) {
                Some(spec) => match spec.check_value(value) {
                    Ok(s) => {
                        out.set(key.clone(), s);
                    }
                    Err(issue) => issues.push(issue),
                },
                None => {
                    if self.unknown_fields == UnknownFields::Reject {
                        issues.push(ValidationIssue::UnknownField { field: key.clone() });
                    }
                }
            }
        }

        if issues.is_empty() {
            Validation::Valid(out)
        } else {
            Validation::Invalid(ValidationError { issues })
        }
    }
}
