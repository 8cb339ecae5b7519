//! Error types for the entity model.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while constructing model values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    /// Kind names must be non-empty and consist of word characters only.
    #[error("illegal kind name: {0:?}")]
    InvalidKind(String),
}
