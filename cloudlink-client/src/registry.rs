//! Standing subscriptions for continuous queries.
//!
//! Each entry maps a [`QueryId`] to the application's handler, the query to
//! run on the next push notification, and the credential to run it with.
//! Entries are replaced wholesale on re-registration; an epoch counter tells
//! results of an old registration apart from those of the current one, so a
//! late result never reaches a newer subscriber.

use crate::credential::Credential;
use crate::dispatch::ResultHandler;
use crate::error::{ClientError, ClientResult};
use cloudlink_model::Entity;
use cloudlink_query::CloudQuery;
use cloudlink_types::QueryId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Handler type stored for continuous queries.
pub type SharedHandler = Arc<dyn ResultHandler<Vec<Entity>>>;

/// Lifecycle of a registered continuous query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Registered; the initial query has not answered yet.
    PendingFirstResult,
    /// Waiting for a push notification.
    Armed,
    /// A refresh was dispatched and has not answered yet.
    PendingRefresh,
}

struct Subscription {
    handler: SharedHandler,
    next_query: CloudQuery,
    credential: Option<Credential>,
    state: SubscriptionState,
    epoch: u64,
}

/// A refresh to dispatch after a push notification.
#[derive(Debug, Clone)]
pub struct Refresh {
    pub query: CloudQuery,
    pub credential: Option<Credential>,
    pub epoch: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<QueryId, Subscription>,
    next_epoch: u64,
}

/// Registry of continuous queries, shared by the backend and the messaging
/// layer.
#[derive(Default)]
pub struct ContinuousQueryRegistry {
    inner: Mutex<Inner>,
}

impl ContinuousQueryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers (or replaces) the subscription for `query_id` and returns
    /// its epoch.
    pub fn register(
        &self,
        query_id: QueryId,
        handler: SharedHandler,
        next_query: CloudQuery,
        credential: Option<Credential>,
    ) -> u64 {
        let mut inner = self.lock();
        inner.next_epoch += 1;
        let epoch = inner.next_epoch;
        let replaced = inner.entries.insert(
            query_id.clone(),
            Subscription {
                handler,
                next_query,
                credential,
                state: SubscriptionState::PendingFirstResult,
                epoch,
            },
        );
        if replaced.is_some() {
            debug!("Replaced subscription for query {query_id} (epoch {epoch})");
        } else {
            debug!("Registered subscription for query {query_id} (epoch {epoch})");
        }
        epoch
    }

    /// Marks the subscription as refreshing and returns what to dispatch.
    ///
    /// The stored next query is re-shadowed in place; its window only moves
    /// forward when a delivery re-arms it, so refreshes dispatched before
    /// that return overlapping results. Returns `None` for unknown ids.
    pub fn refresh(&self, query_id: &QueryId) -> Option<Refresh> {
        let mut inner = self.lock();
        let entry = inner.entries.get_mut(query_id)?;
        entry.state = SubscriptionState::PendingRefresh;
        entry.next_query = entry.next_query.shadow();
        Some(Refresh {
            query: entry.next_query.clone(),
            credential: entry.credential.clone(),
            epoch: entry.epoch,
        })
    }

    /// Replaces the query to run on the next notification, keeping the
    /// handler, credential and epoch.
    ///
    /// Fails with [`ClientError::SubscriptionNotFound`] for unknown ids, e.g.
    /// when the subscription was dropped while its result was in flight.
    pub fn rearm(&self, query_id: &QueryId, next_query: CloudQuery) -> ClientResult<()> {
        let mut inner = self.lock();
        let entry = inner
            .entries
            .get_mut(query_id)
            .ok_or_else(|| ClientError::SubscriptionNotFound(query_id.clone()))?;
        entry.next_query = next_query;
        Ok(())
    }

    /// Delivers a result to the handler registered under `(query_id, epoch)`.
    ///
    /// The handler runs after the registry lock is released. Results for an
    /// unsubscribed id or an older epoch are dropped. Returns whether a
    /// handler was called.
    pub fn deliver(&self, query_id: &QueryId, epoch: u64, result: ClientResult<Vec<Entity>>) -> bool {
        let handler = {
            let mut inner = self.lock();
            match inner.entries.get_mut(query_id) {
                Some(entry) if entry.epoch == epoch => {
                    entry.state = SubscriptionState::Armed;
                    Arc::clone(&entry.handler)
                }
                _ => {
                    debug!("Dropping result for query {query_id} (epoch {epoch}): no longer subscribed");
                    return false;
                }
            }
        };
        handler.handle(result);
        true
    }

    /// Removes one subscription. Returns whether it existed.
    pub fn unsubscribe(&self, query_id: &QueryId) -> bool {
        let removed = self.lock().entries.remove(query_id).is_some();
        if removed {
            debug!("Unsubscribed query {query_id}");
        }
        removed
    }

    /// Removes every subscription.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let count = inner.entries.len();
        inner.entries.clear();
        debug!("Cleared {count} subscriptions");
    }

    pub fn contains(&self, query_id: &QueryId) -> bool {
        self.lock().entries.contains_key(query_id)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn state(&self, query_id: &QueryId) -> Option<SubscriptionState> {
        self.lock().entries.get(query_id).map(|e| e.state)
    }

    pub fn epoch(&self, query_id: &QueryId) -> Option<u64> {
        self.lock().entries.get(query_id).map(|e| e.epoch)
    }

    /// The query that the next notification for `query_id` will run.
    pub fn next_query(&self, query_id: &QueryId) -> Option<CloudQuery> {
        self.lock().entries.get(query_id).map(|e| e.next_query.clone())
    }

    /// Ids of every registered subscription.
    pub fn query_ids(&self) -> Vec<QueryId> {
        self.lock().entries.keys().cloned().collect()
    }
}
