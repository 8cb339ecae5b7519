//! Core type definitions for Cloudlink.
//!
//! This crate defines the small, dependency-light primitives shared by every
//! other crate in the workspace:
//! - Millisecond-precision timestamps assigned by the entity store
//! - Query identities used to correlate push notifications with subscriptions
//! - Topic identities for the messaging layer
//!
//! Entity and query types live in `cloudlink-model` and `cloudlink-query`.

mod ids;
mod timestamp;

pub use ids::{QueryId, TopicId};
pub use timestamp::Timestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid query id: {0:?}")]
    InvalidQueryId(String),

    #[error("invalid topic id: {0:?}")]
    InvalidTopicId(String),
}
