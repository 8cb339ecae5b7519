//! Per-topic bookmarks: the creation time of the newest message delivered on
//! each topic.
//!
//! Bookmarks bound the catch-up query when a topic is subscribed again, so
//! messages already seen are not delivered twice. They only ever move
//! forward.

use crate::error::{ClientError, ClientResult};
use cloudlink_types::{Timestamp, TopicId};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Durable `topic -> last seen timestamp` map.
pub trait BookmarkStore: Send + Sync {
    /// Returns the bookmark for `topic`, if one was ever written.
    fn get(&self, topic: &TopicId) -> ClientResult<Option<Timestamp>>;

    /// Overwrites the bookmark for `topic`.
    fn set(&self, topic: &TopicId, at: Timestamp) -> ClientResult<()>;

    /// Moves the bookmark forward to `at` unless it is already later.
    /// Returns the bookmark after the update.
    fn advance(&self, topic: &TopicId, at: Timestamp) -> ClientResult<Timestamp>;

    /// Forgets the bookmark for `topic`.
    fn remove(&self, topic: &TopicId) -> ClientResult<()>;
}

/// Bookmark store backed by a SQLite file.
pub struct SqliteBookmarkStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBookmarkStore {
    /// Opens (or creates) a bookmark store at the given path.
    pub fn open(path: impl AsRef<Path>) -> ClientResult<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| ClientError::Storage(format!("failed to open bookmark store: {e}")))?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory bookmark store (for testing).
    pub fn open_in_memory() -> ClientResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            ClientError::Storage(format!("failed to open in-memory bookmark store: {e}"))
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> ClientResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> ClientResult<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS topic_bookmarks (
                topic_id TEXT PRIMARY KEY,
                last_seen INTEGER NOT NULL
            );
            ",
        )
        .map_err(|e| ClientError::Storage(format!("failed to init bookmark schema: {e}")))?;
        Ok(())
    }
}

impl BookmarkStore for SqliteBookmarkStore {
    fn get(&self, topic: &TopicId) -> ClientResult<Option<Timestamp>> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let millis: Option<i64> = conn
            .query_row(
                "SELECT last_seen FROM topic_bookmarks WHERE topic_id = ?1",
                params![topic.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| ClientError::Storage(format!("failed to read bookmark: {e}")))?;
        Ok(millis.map(Timestamp::from_millis))
    }

    fn set(&self, topic: &TopicId, at: Timestamp) -> ClientResult<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "INSERT OR REPLACE INTO topic_bookmarks (topic_id, last_seen) VALUES (?1, ?2)",
            params![topic.as_str(), at.as_millis()],
        )
        .map_err(|e| ClientError::Storage(format!("failed to write bookmark: {e}")))?;
        Ok(())
    }

    fn advance(&self, topic: &TopicId, at: Timestamp) -> ClientResult<Timestamp> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "INSERT INTO topic_bookmarks (topic_id, last_seen) VALUES (?1, ?2)
             ON CONFLICT(topic_id) DO UPDATE SET last_seen = MAX(last_seen, excluded.last_seen)",
            params![topic.as_str(), at.as_millis()],
        )
        .map_err(|e| ClientError::Storage(format!("failed to advance bookmark: {e}")))?;
        let millis: i64 = conn
            .query_row(
                "SELECT last_seen FROM topic_bookmarks WHERE topic_id = ?1",
                params![topic.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| ClientError::Storage(format!("failed to read bookmark: {e}")))?;
        Ok(Timestamp::from_millis(millis))
    }

    fn remove(&self, topic: &TopicId) -> ClientResult<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "DELETE FROM topic_bookmarks WHERE topic_id = ?1",
            params![topic.as_str()],
        )
        .map_err(|e| ClientError::Storage(format!("failed to remove bookmark: {e}")))?;
        Ok(())
    }
}

/// Bookmark store that lives and dies with the process.
#[derive(Debug, Default)]
pub struct MemoryBookmarkStore {
    bookmarks: Mutex<HashMap<TopicId, Timestamp>>,
}

impl MemoryBookmarkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BookmarkStore for MemoryBookmarkStore {
    fn get(&self, topic: &TopicId) -> ClientResult<Option<Timestamp>> {
        let bookmarks = self.bookmarks.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(bookmarks.get(topic).copied())
    }

    fn set(&self, topic: &TopicId, at: Timestamp) -> ClientResult<()> {
        let mut bookmarks = self.bookmarks.lock().unwrap_or_else(PoisonError::into_inner);
        bookmarks.insert(topic.clone(), at);
        Ok(())
    }

    fn advance(&self, topic: &TopicId, at: Timestamp) -> ClientResult<Timestamp> {
        let mut bookmarks = self.bookmarks.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = bookmarks.entry(topic.clone()).or_insert(at);
        *entry = entry.latest(at);
        Ok(*entry)
    }

    fn remove(&self, topic: &TopicId) -> ClientResult<()> {
        let mut bookmarks = self.bookmarks.lock().unwrap_or_else(PoisonError::into_inner);
        bookmarks.remove(topic);
        Ok(())
    }
}
