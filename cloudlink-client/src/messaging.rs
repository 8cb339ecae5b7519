//! Topic-based messaging over continuous queries.
//!
//! A message is an entity of kind [`KIND_NAME`] carrying a `topicId`
//! property. Subscribing to a topic registers a continuous query whose id is
//! the topic id, so a second subscription to the same topic replaces the
//! first. Each topic keeps a bookmark (the creation time of the newest
//! message delivered) that bounds catch-up on the next subscribe and every
//! refresh in between.
//!
//! Handlers receive each batch in ascending creation order.

use crate::backend::CloudBackend;
use crate::bookmark::BookmarkStore;
use crate::clock::{Clock, SystemClock};
use crate::dispatch::ResultHandler;
use crate::error::{ClientError, ClientResult};
use crate::registry::ContinuousQueryRegistry;
use cloudlink_model::{Entity, PROP_CREATED_AT};
use cloudlink_query::{CloudQuery, Filter, Order, Scope};
use cloudlink_types::{QueryId, Timestamp, TopicId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Reserved kind for messages.
pub const KIND_NAME: &str = "_CloudMessages";

/// Property holding a message's topic id.
pub const PROP_TOPIC_ID: &str = "topicId";

/// Builds the query for messages on `topic` created after `since`, newest
/// first.
fn message_query(topic: &TopicId, since: Timestamp, limit: u32, scope: Scope) -> ClientResult<CloudQuery> {
    let filter = Filter::and([
        Filter::eq(PROP_TOPIC_ID, topic.as_str()),
        Filter::gt(PROP_CREATED_AT, since),
    ])?;
    Ok(CloudQuery::new(KIND_NAME)?
        .with_filter(filter)?
        .with_sort(PROP_CREATED_AT, Order::Desc)
        .with_limit(limit)
        .with_scope(scope)
        .with_query_id(QueryId::from(topic)))
}

/// Publish/subscribe messaging on top of a [`CloudBackend`].
pub struct CloudMessaging {
    backend: Arc<CloudBackend>,
    bookmarks: Arc<dyn BookmarkStore>,
    clock: Arc<dyn Clock>,
}

impl CloudMessaging {
    pub fn new(backend: Arc<CloudBackend>, bookmarks: Arc<dyn BookmarkStore>) -> Self {
        Self::with_clock(backend, bookmarks, Arc::new(SystemClock))
    }

    /// Uses `clock` as "now" when a subscription has no bookmark to start
    /// from.
    pub fn with_clock(
        backend: Arc<CloudBackend>,
        bookmarks: Arc<dyn BookmarkStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            bookmarks,
            clock,
        }
    }

    pub fn backend(&self) -> &Arc<CloudBackend> {
        &self.backend
    }

    pub fn bookmarks(&self) -> &Arc<dyn BookmarkStore> {
        &self.bookmarks
    }

    /// Creates an empty message addressed to `topic`.
    pub fn create_message(&self, topic: &TopicId) -> ClientResult<Entity> {
        Ok(Entity::new(KIND_NAME)?.with(PROP_TOPIC_ID, topic.as_str()))
    }

    /// Creates an empty message addressed to the broadcast topic.
    pub fn create_broadcast_message(&self) -> ClientResult<Entity> {
        self.create_message(&TopicId::broadcast())
    }

    /// Sends a message. Subscribers on its topic see it on their next
    /// refresh; nothing is delivered locally.
    pub fn send_message(&self, message: Entity, handler: impl ResultHandler<Entity>) -> ClientResult<()> {
        if message.kind() != KIND_NAME {
            return Err(ClientError::InvalidArgument(format!(
                "messages must have kind {KIND_NAME}, got {}",
                message.kind()
            )));
        }
        let topic = message.get_str(PROP_TOPIC_ID).ok_or_else(|| {
            ClientError::InvalidArgument(format!("message has no {PROP_TOPIC_ID} property"))
        })?;
        TopicId::parse(topic)?;
        self.backend.insert(message, handler)
    }

    /// Subscribes to `topic`.
    ///
    /// With `max_catch_up > 0`, up to that many messages newer than the
    /// topic's bookmark are delivered first (or none, if the topic has no
    /// bookmark yet). With `max_catch_up == 0` only messages sent from now
    /// on are delivered.
    pub fn subscribe(
        &self,
        topic: &TopicId,
        handler: impl ResultHandler<Vec<Entity>>,
        max_catch_up: u32,
    ) -> ClientResult<()> {
        let now = self.clock.now();
        let (since, limit, scope) = if max_catch_up > 0 {
            let since = self.bookmarks.get(topic)?.unwrap_or(now);
            (since, max_catch_up, Scope::FutureAndPast)
        } else {
            (now, self.backend.config().default_max_messages, Scope::Future)
        };
        let query = message_query(topic, since, limit, scope)?;
        debug!("Subscribing to topic {topic} since {since}");

        let delivery = TopicDelivery {
            topic: topic.clone(),
            bookmarks: Arc::clone(&self.bookmarks),
            registry: Arc::clone(self.backend.registry()),
            refresh_limit: self.backend.config().default_max_messages,
            handler,
        };
        self.backend.list(query, delivery)
    }

    /// Stops delivering messages for `topic`. The bookmark is kept.
    pub fn unsubscribe(&self, topic: &TopicId) -> bool {
        self.backend.unsubscribe(&QueryId::from(topic))
    }
}

/// Wraps a topic handler: drops messages the bookmark already covers,
/// advances the bookmark, re-arms the refresh query and hands the batch over
/// oldest first.
struct TopicDelivery<H> {
    topic: TopicId,
    bookmarks: Arc<dyn BookmarkStore>,
    registry: Arc<ContinuousQueryRegistry>,
    refresh_limit: u32,
    handler: H,
}

impl<H> TopicDelivery<H> {
    /// Removes messages at or before the topic's bookmark. Overlapping
    /// refreshes (two notifications answered from the same window) return
    /// the same messages; only the first delivery keeps them.
    fn drop_delivered(&self, batch: &mut Vec<Entity>) {
        let delivered = match self.bookmarks.get(&self.topic) {
            Ok(Some(bookmark)) => bookmark,
            Ok(None) => return,
            Err(e) => {
                warn!("Failed to read bookmark for topic {}: {e}", self.topic);
                return;
            }
        };
        let before = batch.len();
        batch.retain(|m| m.created_at.is_none_or(|at| at > delivered));
        if batch.len() < before {
            debug!(
                "Dropped {} already delivered messages on topic {}",
                before - batch.len(),
                self.topic
            );
        }
    }

    fn rearm(&self, bookmark: Timestamp) {
        let rearmed = message_query(&self.topic, bookmark, self.refresh_limit, Scope::Past)
            .and_then(|next| self.registry.rearm(&QueryId::from(&self.topic), next));
        match rearmed {
            Ok(()) => {}
            Err(e @ ClientError::SubscriptionNotFound(_)) => {
                debug!("Not re-arming topic {}: {e}", self.topic);
            }
            Err(e) => warn!("Failed to re-arm topic {}: {e}", self.topic),
        }
    }
}

impl<H: ResultHandler<Vec<Entity>>> ResultHandler<Vec<Entity>> for TopicDelivery<H> {
    fn on_complete(&self, mut batch: Vec<Entity>) {
        self.drop_delivered(&mut batch);
        if batch.is_empty() {
            return;
        }

        if let Some(newest) = batch.iter().filter_map(|m| m.created_at).max() {
            let bookmark = match self.bookmarks.advance(&self.topic, newest) {
                Ok(bookmark) => bookmark,
                Err(e) => {
                    warn!("Failed to advance bookmark for topic {}: {e}", self.topic);
                    newest
                }
            };
            self.rearm(bookmark);
        }

        batch.reverse();
        self.handler.on_complete(batch);
    }

    fn on_error(&self, error: ClientError) {
        self.handler.on_error(error);
    }
}
