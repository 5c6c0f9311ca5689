//! Shared primitives for all Rust crates in Trackfield.

#![forbid(unsafe_code)]

/// Entity identity primitives shared across services.
pub mod entity;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use entity::EntityRef;

/// Result type used across Trackfield crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required field-schema sub-key is absent. Carries the dotted key path.
    #[error("missing required schema key: {0}")]
    MissingSchemaKey(String),

    /// A filter group declares a logical operator outside the known set.
    #[error("logical operator '{0}' is not supported, expecting 'and' or 'or'")]
    UnsupportedOperator(String),

    /// A query field declares an aggregation mode outside the dispatch table.
    #[error("unsupported summary value type '{0}'")]
    UnsupportedValueType(String),

    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Opaque failure from the remote tracking service.
    #[error("remote call failed: {0}")]
    Remote(String),
}

#[cfg(test)]
mod tests {
    use super::{AppError, NonEmptyString};

    #[test]
    fn non_empty_string_rejects_whitespace() {
        let result = NonEmptyString::new("   ");
        assert!(result.is_err());
    }

    #[test]
    fn missing_schema_key_formats_key_path() {
        let error = AppError::MissingSchemaKey("properties.query.value".to_owned());
        assert_eq!(
            error.to_string(),
            "missing required schema key: properties.query.value"
        );
    }
}
