//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)      ValidationErrors (foodhub-core)       │
//! │       │                                  │                              │
//! │       ▼                                  ▼                              │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  HTTP handler (caller) maps each category to a status code:            │
//! │    NotFound → 404, EditConflict → 409, Validation → 422,               │
//! │    RestaurantMismatch → 403, everything else → 500                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use foodhub_core::{ValidationError, ValidationErrors};
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - ID doesn't exist
    /// - Row exists but belongs to another restaurant or customer
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The row changed since it was read, or its state forbids the change.
    ///
    /// ## When This Occurs
    /// - `version` no longer matches (someone else updated first)
    /// - Adding or revising items of a delivered order
    #[error("unable to update {entity} {id} due to an edit conflict, please try again")]
    EditConflict { entity: String, id: String },

    /// One or more fields failed validation.
    ///
    /// Also used for a duplicate email, reported against the `email` field.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// The order belongs to a different restaurant than the caller's.
    #[error("order {order_id} does not belong to restaurant {restaurant_id}")]
    RestaurantMismatch { order_id: i64, restaurant_id: i64 },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Any UNIQUE index violation not translated by its repository
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Referencing a non-existent user, order or dish
    /// - Deleting a dish that order items still reference
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// The call ran past its deadline and was abandoned.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The dish row was deleted but its photo file could not be removed.
    #[error("dish deleted but photo {path} could not be removed: {source}")]
    PhotoCleanupFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates an EditConflict error for a given entity type and ID.
    pub fn edit_conflict(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::EditConflict {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Duplicate email, reported as a field-level validation failure.
    pub fn duplicate_email(email: impl Into<String>) -> Self {
        DbError::Validation(ValidationErrors::single(ValidationError::Duplicate {
            field: "email".to_string(),
            value: email.into(),
        }))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. })
    }

    pub fn is_edit_conflict(&self) -> bool {
        matches!(self, DbError::EditConflict { .. })
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite error messages for constraints:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if let Some(target) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    // Keep the column, drop the table qualifier
                    let field = target
                        .split_once('.')
                        .map(|(_, column)| column)
                        .unwrap_or(target)
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_email_is_a_field_error() {
        let err = DbError::duplicate_email("a@example.com");
        match err {
            DbError::Validation(errors) => {
                assert_eq!(
                    errors.messages()["email"],
                    "email 'a@example.com' already exists"
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_helpers() {
        assert!(DbError::not_found("Dish", 7).is_not_found());
        assert!(DbError::edit_conflict("Order", 7).is_edit_conflict());
        assert_eq!(
            DbError::not_found("Dish", 7).to_string(),
            "Dish not found: 7"
        );
    }
}
