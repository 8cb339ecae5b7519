//! Error types for filters and queries.

use thiserror::Error;

/// Result type for query construction.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while building or decoding queries.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Malformed filter or query field.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid kind name.
    #[error(transparent)]
    Model(#[from] cloudlink_model::ModelError),

    /// Invalid query id.
    #[error(transparent)]
    Types(#[from] cloudlink_types::Error),
}
