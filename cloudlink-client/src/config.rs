//! Client configuration.

use crate::bookmark::{BookmarkStore, MemoryBookmarkStore, SqliteBookmarkStore};
use crate::error::{ClientError, ClientResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default number of concurrent store calls.
pub const DEFAULT_MAX_CONCURRENT_CALLS: usize = 16;

/// Default page size for topic subscriptions and refreshes.
pub const DEFAULT_MAX_MESSAGES: u32 = 100;

/// Configuration for [`CloudBackend`](crate::CloudBackend) and
/// [`CloudMessaging`](crate::CloudMessaging).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Store calls allowed in flight at once.
    pub max_concurrent_calls: usize,
    /// Message limit used when a subscription does not ask for catch-up,
    /// and for every refresh after the first delivery.
    pub default_max_messages: u32,
    /// SQLite file holding topic bookmarks. `None` keeps them in memory.
    pub bookmark_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: DEFAULT_MAX_CONCURRENT_CALLS,
            default_max_messages: DEFAULT_MAX_MESSAGES,
            bookmark_path: None,
        }
    }
}

impl ClientConfig {
    /// Parses a JSON config. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> ClientResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Storage(format!("failed to read config {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.max_concurrent_calls == 0 {
            return Err(ClientError::InvalidArgument(
                "max_concurrent_calls must be at least 1".to_string(),
            ));
        }
        if self.default_max_messages == 0 {
            return Err(ClientError::InvalidArgument(
                "default_max_messages must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Opens the bookmark store this config points at.
    pub fn open_bookmarks(&self) -> ClientResult<Arc<dyn BookmarkStore>> {
        Ok(match &self.bookmark_path {
            Some(path) => Arc::new(SqliteBookmarkStore::open(path)?),
            None => Arc::new(MemoryBookmarkStore::new()),
        })
    }
}
