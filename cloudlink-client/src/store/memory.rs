//! In-process entity store for tests and offline use.
//!
//! Assigns ids and timestamps the way the remote store does, evaluates
//! filters, sort, limit and scope locally, and raises a push notification
//! for every registered continuous query matched by an insert or update.

use super::entity_store::EntityStore;
use crate::clock::{Clock, SystemClock};
use crate::credential::Credential;
use crate::error::{ClientError, ClientResult};
use crate::push::PushNotification;
use async_trait::async_trait;
use cloudlink_model::{Entity, validate_kind};
use cloudlink_query::{CloudQuery, Order};
use cloudlink_types::{QueryId, Timestamp};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

struct StoredSubscription {
    query: CloudQuery,
    expires_at: Option<Timestamp>,
}

#[derive(Default)]
struct MemoryState {
    /// Insertion order is the tie-breaker for sorting.
    entities: Vec<Entity>,
    subscriptions: HashMap<QueryId, StoredSubscription>,
    received: Vec<CloudQuery>,
    failures: VecDeque<String>,
    notifications: Vec<PushNotification>,
    notify_tx: Option<mpsc::UnboundedSender<PushNotification>>,
}

/// Entity store held entirely in memory.
pub struct InMemoryEntityStore {
    clock: Arc<dyn Clock>,
    state: Mutex<MemoryState>,
}

impl Default for InMemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEntityStore {
    /// Creates an empty store stamping entities with wall-clock time.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store stamping entities with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(MemoryState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the next call fail with [`ClientError::RemoteIo`].
    pub fn fail_next(&self, message: impl Into<String>) {
        self.lock().failures.push_back(message.into());
    }

    /// Every query received by [`EntityStore::list`], oldest first.
    pub fn received_queries(&self) -> Vec<CloudQuery> {
        self.lock().received.clone()
    }

    /// Drains the notifications raised since the last call.
    pub fn take_notifications(&self) -> Vec<PushNotification> {
        std::mem::take(&mut self.lock().notifications)
    }

    /// Streams future notifications as they are raised.
    ///
    /// Notifications are still recorded for
    /// [`take_notifications`](Self::take_notifications). A second call
    /// replaces the previous stream.
    pub fn notification_stream(&self) -> mpsc::UnboundedReceiver<PushNotification> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().notify_tx = Some(tx);
        rx
    }

    /// Ids of the continuous queries currently registered with the store.
    pub fn subscription_ids(&self) -> Vec<QueryId> {
        self.lock().subscriptions.keys().cloned().collect()
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.lock().entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entities.is_empty()
    }

    fn take_failure(&self) -> ClientResult<()> {
        match self.lock().failures.pop_front() {
            Some(message) => Err(ClientError::RemoteIo(message)),
            None => Ok(()),
        }
    }

    fn store_new(&self, state: &mut MemoryState, mut entity: Entity) -> Entity {
        let now = self.clock.now();
        if !entity.is_persisted() {
            entity.id = Some(uuid::Uuid::new_v4().to_string());
        }
        entity.created_at = Some(now);
        entity.updated_at = Some(now);

        let id = entity.id.clone();
        state
            .entities
            .retain(|e| !(e.kind() == entity.kind() && e.id == id));
        state.entities.push(entity.clone());
        self.notify_matching(state, &entity, now);
        entity
    }

    fn store_update(&self, state: &mut MemoryState, mut entity: Entity) -> ClientResult<Entity> {
        let now = self.clock.now();
        let slot = state
            .entities
            .iter_mut()
            .find(|e| e.kind() == entity.kind() && e.id == entity.id && entity.is_persisted())
            .ok_or_else(|| ClientError::NotFound(describe(&entity)))?;
        entity.created_at = slot.created_at;
        entity.created_by = slot.created_by.clone();
        entity.updated_at = Some(now);
        *slot = entity.clone();
        self.notify_matching(state, &entity, now);
        Ok(entity)
    }

    fn notify_matching(&self, state: &mut MemoryState, entity: &Entity, now: Timestamp) {
        let matched: Vec<QueryId> = state
            .subscriptions
            .iter()
            .filter(|(_, sub)| sub.expires_at.is_none_or(|at| now < at))
            .filter(|(_, sub)| matches_query(&sub.query, entity))
            .map(|(id, _)| id.clone())
            .collect();

        for query_id in matched {
            debug!("Raising push notification for query {query_id}");
            let notification = PushNotification::new(query_id);
            if let Some(tx) = &state.notify_tx {
                let _ = tx.send(notification.clone());
            }
            state.notifications.push(notification);
        }
    }

    fn evaluate(state: &MemoryState, query: &CloudQuery) -> Vec<Entity> {
        let mut results: Vec<Entity> = state
            .entities
            .iter()
            .filter(|e| matches_query(query, e))
            .cloned()
            .collect();

        if let Some(sort) = query.sort() {
            results.sort_by(|a, b| compare_property(a, b, &sort.property, sort.order));
        }
        if let Some(limit) = query.limit() {
            results.truncate(limit as usize);
        }
        results
    }
}

fn describe(entity: &Entity) -> String {
    format!("{}/{}", entity.kind(), entity.id.as_deref().unwrap_or("-"))
}

fn matches_query(query: &CloudQuery, entity: &Entity) -> bool {
    entity.kind() == query.kind_name() && query.filter().is_none_or(|f| f.matches(entity))
}

/// Orders by a property; entities missing it sort last in either direction.
fn compare_property(a: &Entity, b: &Entity, property: &str, order: Order) -> Ordering {
    match (a.property(property), b.property(property)) {
        (Some(x), Some(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            match order {
                Order::Asc => ord,
                Order::Desc => ord.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn insert(&self, entity: Entity, _credential: Option<&Credential>) -> ClientResult<Entity> {
        self.take_failure()?;
        let mut state = self.lock();
        Ok(self.store_new(&mut state, entity))
    }

    async fn insert_all(
        &self,
        entities: Vec<Entity>,
        _credential: Option<&Credential>,
    ) -> ClientResult<Vec<Entity>> {
        self.take_failure()?;
        let mut state = self.lock();
        Ok(entities
            .into_iter()
            .map(|e| self.store_new(&mut state, e))
            .collect())
    }

    async fn update(&self, entity: Entity, _credential: Option<&Credential>) -> ClientResult<Entity> {
        self.take_failure()?;
        let mut state = self.lock();
        self.store_update(&mut state, entity)
    }

    async fn update_all(
        &self,
        entities: Vec<Entity>,
        _credential: Option<&Credential>,
    ) -> ClientResult<Vec<Entity>> {
        self.take_failure()?;
        let mut state = self.lock();
        entities
            .into_iter()
            .map(|e| self.store_update(&mut state, e))
            .collect()
    }

    async fn get(
        &self,
        kind: &str,
        id: &str,
        _credential: Option<&Credential>,
    ) -> ClientResult<Entity> {
        self.take_failure()?;
        validate_kind(kind)?;
        self.lock()
            .entities
            .iter()
            .find(|e| e.kind() == kind && e.id.as_deref() == Some(id))
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("{kind}/{id}")))
    }

    async fn get_all(
        &self,
        kind: &str,
        ids: &[String],
        _credential: Option<&Credential>,
    ) -> ClientResult<Vec<Entity>> {
        self.take_failure()?;
        validate_kind(kind)?;
        let state = self.lock();
        Ok(ids
            .iter()
            .filter_map(|id| {
                state
                    .entities
                    .iter()
                    .find(|e| e.kind() == kind && e.id.as_ref() == Some(id))
                    .cloned()
            })
            .collect())
    }

    async fn delete(&self, kind: &str, id: &str, _credential: Option<&Credential>) -> ClientResult<()> {
        self.take_failure()?;
        let mut state = self.lock();
        let before = state.entities.len();
        state
            .entities
            .retain(|e| !(e.kind() == kind && e.id.as_deref() == Some(id)));
        if state.entities.len() == before {
            return Err(ClientError::NotFound(format!("{kind}/{id}")));
        }
        Ok(())
    }

    async fn delete_all(
        &self,
        kind: &str,
        ids: &[String],
        _credential: Option<&Credential>,
    ) -> ClientResult<()> {
        self.take_failure()?;
        let mut state = self.lock();
        state
            .entities
            .retain(|e| !(e.kind() == kind && e.id.as_ref().is_some_and(|id| ids.contains(id))));
        Ok(())
    }

    async fn list(
        &self,
        query: &CloudQuery,
        _credential: Option<&Credential>,
    ) -> ClientResult<Vec<Entity>> {
        self.take_failure()?;
        let now = self.clock.now();
        let mut state = self.lock();
        state.received.push(query.clone());

        if query.is_continuous() {
            let secs = query.subscription_duration_secs();
            let expires_at = (secs > 0).then(|| {
                let millis = i64::try_from(secs)
                    .unwrap_or(i64::MAX)
                    .saturating_mul(1000);
                Timestamp::from_millis(now.as_millis().saturating_add(millis))
            });
            state.subscriptions.insert(
                query.query_id(),
                StoredSubscription {
                    query: query.clone(),
                    expires_at,
                },
            );
        }

        if !query.scope().includes_past() {
            return Ok(Vec::new());
        }
        Ok(Self::evaluate(&state, query))
    }
}
