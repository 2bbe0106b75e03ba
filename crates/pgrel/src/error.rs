//! Error types for pgrel

use thiserror::Error;

/// Result type alias for pgrel operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for database operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row not found, or the number of matching rows was not the one expected
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Builder state that cannot be turned into a statement
    #[error("Validation error: {0}")]
    Validation(String),

    /// Failure annotated with the operation that produced it (`get`, `insert`, ...)
    #[error("pgrel.{op}: {source}")]
    Context {
        op: &'static str,
        #[source]
        source: Box<OrmError>,
    },

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Wrap this error with the name of the operation that failed.
    pub fn context(self, op: &'static str) -> Self {
        Self::Context {
            op,
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping every `Context` layer.
    pub fn root(&self) -> &OrmError {
        let mut err = self;
        while let Self::Context { source, .. } = err {
            err = source;
        }
        err
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self.root(), Self::UniqueViolation(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound(_))
    }

    /// Check if this is a row decode error
    pub fn is_decode(&self) -> bool {
        matches!(self.root(), Self::Decode { .. })
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
                _ => {}
            }
        }
        Self::Query(err)
    }
}

/// Attach an operation name to the error side of a result.
pub(crate) trait ResultExt<T> {
    fn op(self, op: &'static str) -> OrmResult<T>;
}

impl<T> ResultExt<T> for OrmResult<T> {
    fn op(self, op: &'static str) -> OrmResult<T> {
        self.map_err(|e| e.context(op))
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

    #[test]
    fn context_is_transparent_to_predicates() {
        let err = OrmError::not_found("no rows").context("find").context("load");
        assert!(err.is_not_found());
        assert!(!err.is_unique_violation());
        assert_eq!(err.to_string(), "pgrel.load: pgrel.find: Not found: no rows");
    }

    #[test]
    fn decode_error_message_names_column() {
        let err = OrmError::decode("email", "unexpected null");
        assert!(err.is_decode());
        assert_eq!(
            err.to_string(),
            "Decode error on column 'email': unexpected null"
        );
    }
}
