//! Identifier types for continuous queries and messaging topics.
//!
//! Push notifications carry query ids inside colon-separated subscription
//! strings, so neither id type may contain `:`.

use crate::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of digest bytes kept when deriving a query id from a hash.
const DERIVED_ID_BYTES: usize = 12;

/// Identity of a (possibly continuous) query.
///
/// Either chosen explicitly by the caller or derived from a digest of the
/// query's canonical form. Two queries with the same id are treated as the
/// same logical subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(String);

impl QueryId {
    /// Parses an explicit query id.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() || s.contains(':') || s.chars().any(char::is_whitespace) {
            return Err(Error::InvalidQueryId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Derives a query id from a content digest.
    ///
    /// Only the first bytes of the digest are used; the result is URL-safe
    /// base64 without padding.
    #[must_use]
    pub fn from_digest(digest: &[u8]) -> Self {
        let len = digest.len().min(DERIVED_ID_BYTES);
        Self(URL_SAFE_NO_PAD.encode(&digest[..len]))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for QueryId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<TopicId> for QueryId {
    fn from(topic: TopicId) -> Self {
        Self(topic.0)
    }
}

impl From<&TopicId> for QueryId {
    fn from(topic: &TopicId) -> Self {
        Self(topic.0.clone())
    }
}

/// Identity of a messaging topic (a user id, group id, hash tag, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(String);

impl TopicId {
    /// Topic that every messaging client may subscribe to.
    pub const BROADCAST: &'static str = "_broadcast";

    /// Parses a topic id. Empty ids and ids containing whitespace or `:` are rejected.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() || s.contains(':') || s.chars().any(char::is_whitespace) {
            return Err(Error::InvalidTopicId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// The broadcast topic.
    #[must_use]
    pub fn broadcast() -> Self {
        Self(Self::BROADCAST.to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TopicId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
