//! Error types for larapg

use crate::validate::ValidationErrors;
use thiserror::Error;

/// Result type alias for larapg operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for validation, data access and migrations
#[derive(Debug, Error)]
pub enum OrmError {
    /// Input failed one or more validation rules
    #[error("Validation failed: {0}")]
    ValidationFailed(ValidationErrors),

    /// Table is not part of the configured allow-list
    #[error("Invalid table name: {0}")]
    InvalidTable(String),

    /// Identifier does not match the identifier-safe pattern
    #[error("Invalid identifier: {0}")]
    InvalidIdent(String),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// NOT NULL constraint violation
    #[error("Not null violation: {0}")]
    NotNullViolation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Statement or migration step timed out
    #[error("Timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// A migration step failed; the remaining batch was not run
    #[error("Migration {version}_{name} failed: {message}")]
    Migration {
        version: i64,
        name: String,
        message: String,
    },

    /// Invalid configuration (config file, rule definitions, migration files)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a migration error for the given migration
    pub fn migration(version: i64, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Migration {
            version,
            name: name.into(),
            message: message.into(),
        }
    }

    /// HTTP-semantic status code for this error.
    ///
    /// Validation failures are `422`; everything else is a server-side failure.
    pub fn status(&self) -> u16 {
        match self {
            Self::ValidationFailed(_) => 422,
            _ => 500,
        }
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationFailed(_))
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Whether the store failed to run the statement (connectivity, constraint, decode).
    pub fn is_persistence(&self) -> bool {
        match self {
            Self::Connection(_)
            | Self::Query(_)
            | Self::UniqueViolation(_)
            | Self::ForeignKeyViolation(_)
            | Self::CheckViolation(_)
            | Self::NotNullViolation(_)
            | Self::Decode { .. }
            | Self::Timeout(_) => true,
            #[cfg(feature = "pool")]
            Self::Pool(_) => true,
            _ => false,
        }
    }

    /// Field errors carried by a validation failure.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::ValidationFailed(errors) => Some(errors),
            _ => None,
        }
    }

    /// Parse a tokio_postgres error into a more specific OrmError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                "23502" => {
                    let column = db_err.column().unwrap_or("unknown");
                    return Self::NotNullViolation(format!("{}: {}", column, message));
                }
                _ => {}
            }
        }
        if err.is_closed() {
            return Self::Connection(err.to_string());
        }
        Self::Query(err)
    }
}

impl From<ValidationErrors> for OrmError {
    fn from(errors: ValidationErrors) -> Self {
        Self::ValidationFailed(errors)
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{ValidationCode, ValidationError};

    #[test]
    fn validation_failure_is_422() {
        let mut errors = ValidationErrors::default();
        errors.push(ValidationError::new(
            "name",
            ValidationCode::Required,
            "name is required",
        ));
        let err = OrmError::from(errors);
        assert_eq!(err.status(), 422);
        assert!(err.is_validation());
        assert!(!err.is_persistence());
    }

    #[test]
    fn invalid_table_is_fatal_misconfiguration() {
        let err = OrmError::InvalidTable("accounts".into());
        assert_eq!(err.status(), 500);
        assert!(!err.is_persistence());
        assert_eq!(err.to_string(), "Invalid table name: accounts");
    }

    #[test]
    fn migration_error_names_the_migration() {
        let err = OrmError::migration(2, "create_products", "syntax error");
        assert_eq!(
            err.to_string(),
            "Migration 2_create_products failed: syntax error"
        );
    }
}
