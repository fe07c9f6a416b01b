use thiserror::Error;

use crate::row_mapper::RowMapError;

/// Store operation error.
///
/// These are infrastructure faults (connectivity, constraints, decoding) as
/// opposed to domain errors. Messages can carry raw database text, so they are
/// for logs, not for callers.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection failure in {operation}: {message}")]
    Connection { operation: &'static str, message: String },

    #[error("constraint violation in {operation}: {message}")]
    Constraint { operation: &'static str, message: String },

    #[error("query failure in {operation}: {message}")]
    Query { operation: &'static str, message: String },

    #[error("failed to decode row: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn query(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Query {
            operation,
            message: message.into(),
        }
    }

    pub fn constraint(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Constraint {
            operation,
            message: message.into(),
        }
    }
}

impl From<RowMapError> for StoreError {
    fn from(err: RowMapError) -> Self {
        StoreError::Decode(err.to_string())
    }
}

/// Map SQLx errors to `StoreError`.
///
/// | SQLx error | SQLSTATE | StoreError |
/// |------------|----------|------------|
/// | Database | class `23` (integrity constraint) | `Constraint` |
/// | Database | any other | `Query` |
/// | PoolClosed / PoolTimedOut / Io / Tls | n/a | `Connection` |
/// | ColumnDecode / ColumnNotFound / Decode | n/a | `Decode` |
/// | anything else | n/a | `Query` |
pub(crate) fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_string();
            match db_err.code() {
                Some(code) if code.starts_with("23") => StoreError::Constraint { operation, message },
                _ => StoreError::Query { operation, message },
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => StoreError::Connection {
            operation,
            message: err.to_string(),
        },
        sqlx::Error::Io(e) => StoreError::Connection {
            operation,
            message: e.to_string(),
        },
        sqlx::Error::Tls(e) => StoreError::Connection {
            operation,
            message: e.to_string(),
        },
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_) => StoreError::Decode(format!("{operation}: {err}")),
        _ => StoreError::Query {
            operation,
            message: err.to_string(),
        },
    }
}
