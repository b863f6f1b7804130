//! Error types for the grid store.
//!
//! Every store operation fails with exactly one of two categories so callers
//! can decide on retry policy without inspecting driver errors. The adapter
//! never retries on its own.

/// Errors that can occur in the grid store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached (connection refused, pool
    /// exhausted, connection dropped mid-query).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the request (malformed coordinate, value outside
    /// the schema, bad configuration).
    #[error("invalid store request: {0}")]
    Invalid(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let unavailable = match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => true,
            // SQLSTATE class 08 (connection exception) and 57P (operator
            // intervention, e.g. admin shutdown).
            sqlx::Error::Database(db) => db
                .code()
                .is_some_and(|code| code.starts_with("08") || code.starts_with("57P")),
            _ => false,
        };

        if unavailable {
            Self::Unavailable(err.to_string())
        } else {
            Self::Invalid(err.to_string())
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Invalid(format!("migration failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_errors_are_unavailable() {
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolClosed),
            StoreError::Unavailable(_)
        ));
    }

    #[test]
    fn decode_errors_are_invalid() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Invalid(_)));
    }
}
