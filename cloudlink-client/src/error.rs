//! Error types for the client layer.

use cloudlink_types::QueryId;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in client operations.
///
/// `InvalidArgument` is returned synchronously, before anything is
/// dispatched. Everything that happens on the remote side reaches the
/// application only through its result handler.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Bad input caught before dispatch.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Store or transport failure.
    #[error("remote I/O error: {0}")]
    RemoteIo(String),

    /// HTTP client error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Bookmark storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Credential provider failure.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The store has no entity with the requested id.
    #[error("not found: {0}")]
    NotFound(String),

    /// No continuous query is registered under the id.
    #[error("no subscription for query {0}")]
    SubscriptionNotFound(QueryId),

    /// Constructed outside a tokio runtime.
    #[error("no tokio runtime available")]
    NoRuntime,

    /// The callback context has shut down.
    #[error("channel closed")]
    ChannelClosed,
}

impl ClientError {
    /// Whether the error came from the remote store or the transport.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ClientError::RemoteIo(_) | ClientError::Http(_) | ClientError::NotFound(_)
        )
    }
}

impl From<cloudlink_model::ModelError> for ClientError {
    fn from(e: cloudlink_model::ModelError) -> Self {
        ClientError::InvalidArgument(e.to_string())
    }
}

impl From<cloudlink_query::QueryError> for ClientError {
    fn from(e: cloudlink_query::QueryError) -> Self {
        ClientError::InvalidArgument(e.to_string())
    }
}

impl From<cloudlink_types::Error> for ClientError {
    fn from(e: cloudlink_types::Error) -> Self {
        ClientError::InvalidArgument(e.to_string())
    }
}
