//! Error types for the settings store.
//!
//! Inbound data never produces an error (it is discarded, see
//! [`SyncedStore::handle_inbound`](crate::store::SyncedStore::handle_inbound));
//! these types cover the local surfaces only.

use std::fmt;

use thiserror::Error;

/// A single reason a candidate value failed schema validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// The candidate was not a JSON object.
    NotAnObject { found: &'static str },
    /// The envelope had no `settings` member.
    MissingEnvelopeField { field: String },
    /// A known field held something other than a string.
    WrongType { field: String, found: &'static str },
    /// A known field was shorter than its minimum length.
    TooShort { field: String, min: usize, len: usize },
    /// A known field was longer than its maximum length.
    TooLong { field: String, max: usize, len: usize },
    /// A field the schema does not know about (only under `UnknownFields::Reject`).
    UnknownField { field: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject { found } => write!(f, "expected an object, found {found}"),
            Self::MissingEnvelopeField { field } => write!(f, "missing envelope field `{field}`"),
            Self::WrongType { field, found } => {
                write!(f, "`{field}`: expected a string, found {found}")
            }
            Self::TooShort { field, min, len } => {
                write!(f, "`{field}`: length {len} is below the minimum of {min}")
            }
            Self::TooLong { field, max, len } => {
                write!(f, "`{field}`: length {len} exceeds the maximum of {max}")
            }
            Self::UnknownField { field } => write!(f, "unknown field `{field}`"),
        }
    }
}

/// Schema validation failure, carrying every issue found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    /// Build an error from a single issue.
    pub fn single(issue: ValidationIssue) -> Self {
        Self { issues: vec![issue] }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid settings value")?;
        for (i, issue) in self.issues.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised by a [`Channel`](crate::channel::Channel) implementation.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel has been shut down and accepts no more values.
    #[error("channel is closed")]
    Closed,

    /// The transport rejected or failed to deliver the value.
    #[error("channel transport error: {0}")]
    Transport(String),

    /// The value could not be turned into JSON for the wire.
    #[error("failed to serialize value for the channel: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors surfaced by the store to local callers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A local `save` was rejected by strict validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Sending to the channel failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Store configuration could not be parsed.
    #[error("invalid store configuration: {0}")]
    Config(String),
}

/// Convenience alias for store results.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
