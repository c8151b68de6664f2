//! # Error Types
//!
//! Domain-specific error types for foodhub-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  foodhub-core errors (this file)                                       │
//! │  ├── CoreError         - Domain rule violations                         │
//! │  ├── ValidationError   - One field failed one rule                      │
//! │  └── ValidationErrors  - All failing fields of one entity (field → err) │
//! │                                                                         │
//! │  foodhub-db errors (separate crate)                                    │
//! │  └── DbError           - Store failures, not-found, edit conflicts      │
//! │                                                                         │
//! │  Flow: ValidationErrors → DbError::Validation → HTTP 422 (caller)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use thiserror::Error;

use crate::money::MoneyError;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A string did not name a known order status.
    #[error("unknown order status: {0:?}")]
    UnknownStatus(String),

    /// A string did not name a known user role.
    #[error("unknown role: {0:?}")]
    UnknownRole(String),

    /// The order is in a state that no longer accepts item changes.
    ///
    /// ## When This Occurs
    /// - Adding an item to a delivered order
    /// - Revising an item of a delivered order
    #[error("order {order_id} is {status}, its items cannot be changed")]
    OrderLocked { order_id: i64, status: String },

    /// Money failed to decode.
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// One or more fields failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

// =============================================================================
// Validation Error
// =============================================================================

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} must be provided")]
    Required { field: String },

    /// Field value is too long (counted in characters).
    #[error("{field} must be no more than {max} characters long")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be a positive number")]
    MustBePositive { field: String },

    /// Invalid format (e.g. not an integer, not an email address).
    #[error("{field} {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g. an email already registered).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// A list has fewer entries than required.
    #[error("{field} must contain at least {min} entries")]
    TooFew { field: String, min: usize },

    /// A list has more entries than allowed.
    #[error("{field} must not contain more than {max} entries")]
    TooMany { field: String, max: usize },

    /// A list repeats a value.
    #[error("{field} must not contain duplicate values")]
    NotUnique { field: String },
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::MustBePositive { field }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::NotAllowed { field, .. }
            | ValidationError::Duplicate { field, .. }
            | ValidationError::TooFew { field, .. }
            | ValidationError::TooMany { field, .. }
            | ValidationError::NotUnique { field } => field,
        }
    }
}

// =============================================================================
// Validation Errors (per-field collection)
// =============================================================================

/// Every failing field of an entity, keyed by field name.
///
/// Only the first failure per field is kept, so `name` reports
/// "must be provided" rather than also complaining about its length.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("validation failed: {}", summarize(.errors))]
pub struct ValidationErrors {
    errors: BTreeMap<String, ValidationError>,
}

fn summarize(errors: &BTreeMap<String, ValidationError>) -> String {
    errors
        .values()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a single failure.
    pub fn single(error: ValidationError) -> Self {
        let mut errors = Self::new();
        errors.add(error);
        errors
    }

    /// Records a failure unless the field already has one.
    pub fn add(&mut self, error: ValidationError) {
        self.errors
            .entry(error.field().to_string())
            .or_insert(error);
    }

    /// Returns true when nothing failed.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of failing fields.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Failure recorded for `field`, if any.
    pub fn get(&self, field: &str) -> Option<&ValidationError> {
        self.errors.get(field)
    }

    /// Field name → message map, the shape handed to API consumers.
    pub fn messages(&self) -> BTreeMap<String, String> {
        self.errors
            .iter()
            .map(|(field, error)| (field.clone(), error.to_string()))
            .collect()
    }

    /// Iterates the failures in field order.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.values()
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        ValidationErrors::single(error)
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "name".to_string(),
        };
        assert_eq!(err.to_string(), "name must be provided");

        let err = ValidationError::TooLong {
            field: "description".to_string(),
            max: 280,
        };
        assert_eq!(
            err.to_string(),
            "description must be no more than 280 characters long"
        );
    }

    #[test]
    fn test_first_error_per_field_wins() {
        let mut errors = ValidationErrors::new();
        errors.add(ValidationError::Required {
            field: "name".to_string(),
        });
        errors.add(ValidationError::TooLong {
            field: "name".to_string(),
            max: 100,
        });
        errors.add(ValidationError::MustBePositive {
            field: "price".to_string(),
        });

        assert_eq!(errors.len(), 2);
        assert!(matches!(
            errors.get("name"),
            Some(ValidationError::Required { .. })
        ));

        let messages = errors.messages();
        assert_eq!(messages["name"], "name must be provided");
        assert_eq!(messages["price"], "price must be a positive number");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let errors = ValidationErrors::single(ValidationError::Required {
            field: "address".to_string(),
        });
        let core_err: CoreError = errors.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(
            core_err.to_string(),
            "validation failed: address must be provided"
        );
    }
}
