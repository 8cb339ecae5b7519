//! The application-facing entity API.
//!
//! Every call validates its arguments synchronously, then runs one store call
//! through the [`Dispatcher`] and reports the outcome to a [`ResultHandler`].
//! Continuous queries are registered in the [`ContinuousQueryRegistry`]
//! before their first dispatch; push notifications re-run the registered
//! query and route its results to the same handler.

use crate::config::ClientConfig;
use crate::credential::{Credential, CredentialProvider};
use crate::dispatch::{Dispatcher, ResultHandler};
use crate::error::{ClientError, ClientResult};
use crate::push::{PushNotification, PushRegistrar};
use crate::registry::ContinuousQueryRegistry;
use crate::store::EntityStore;
use cloudlink_model::{Entity, PROP_CREATED_AT, Value, validate_kind};
use cloudlink_query::{CloudQuery, Filter, FilterOp, Order, Scope};
use cloudlink_types::QueryId;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Entry point for entity CRUD, queries and continuous queries.
pub struct CloudBackend {
    store: Arc<dyn EntityStore>,
    dispatcher: Dispatcher,
    registry: Arc<ContinuousQueryRegistry>,
    credential: RwLock<Option<Credential>>,
    registrar: Option<Arc<dyn PushRegistrar>>,
    config: ClientConfig,
}

impl CloudBackend {
    /// Creates a backend over `store`. Must be called inside a tokio runtime.
    pub fn new(store: Arc<dyn EntityStore>, config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            dispatcher: Dispatcher::new(config.max_concurrent_calls)?,
            registry: Arc::new(ContinuousQueryRegistry::new()),
            credential: RwLock::new(None),
            registrar: None,
            config,
        })
    }

    /// Stamps continuous queries with the registrar's push registration id.
    #[must_use]
    pub fn with_push_registrar(mut self, registrar: Arc<dyn PushRegistrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ContinuousQueryRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    // ── Credentials ──────────────────────────────────────────────

    pub fn credential(&self) -> Option<Credential> {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sets the credential used by subsequent calls. Subscriptions keep the
    /// credential they were registered with.
    pub fn set_credential(&self, credential: Option<Credential>) {
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = credential;
    }

    /// Runs the provider's sign-in flow and keeps the resulting credential.
    pub async fn sign_in(&self, provider: &dyn CredentialProvider) -> ClientResult<()> {
        let credential = provider.sign_in().await?;
        info!("Signed in");
        self.set_credential(Some(credential));
        Ok(())
    }

    // ── Entity operations ────────────────────────────────────────

    pub fn insert(&self, entity: Entity, handler: impl ResultHandler<Entity>) -> ClientResult<()> {
        let store = Arc::clone(&self.store);
        let credential = self.credential();
        self.dispatcher.execute(
            async move { store.insert(entity, credential.as_ref()).await },
            handler,
        );
        Ok(())
    }

    pub fn insert_all(
        &self,
        entities: Vec<Entity>,
        handler: impl ResultHandler<Vec<Entity>>,
    ) -> ClientResult<()> {
        let store = Arc::clone(&self.store);
        let credential = self.credential();
        self.dispatcher.execute(
            async move { store.insert_all(entities, credential.as_ref()).await },
            handler,
        );
        Ok(())
    }

    /// Replaces a stored entity. The entity must carry its id.
    pub fn update(&self, entity: Entity, handler: impl ResultHandler<Entity>) -> ClientResult<()> {
        require_persisted(&entity)?;
        let store = Arc::clone(&self.store);
        let credential = self.credential();
        self.dispatcher.execute(
            async move { store.update(entity, credential.as_ref()).await },
            handler,
        );
        Ok(())
    }

    pub fn update_all(
        &self,
        entities: Vec<Entity>,
        handler: impl ResultHandler<Vec<Entity>>,
    ) -> ClientResult<()> {
        entities.iter().try_for_each(require_persisted)?;
        let store = Arc::clone(&self.store);
        let credential = self.credential();
        self.dispatcher.execute(
            async move { store.update_all(entities, credential.as_ref()).await },
            handler,
        );
        Ok(())
    }

    pub fn get(
        &self,
        kind: &str,
        id: &str,
        handler: impl ResultHandler<Entity>,
    ) -> ClientResult<()> {
        validate_kind(kind)?;
        require_id(id)?;
        let (store, credential) = (Arc::clone(&self.store), self.credential());
        let (kind, id) = (kind.to_string(), id.to_string());
        self.dispatcher.execute(
            async move { store.get(&kind, &id, credential.as_ref()).await },
            handler,
        );
        Ok(())
    }

    pub fn get_all(
        &self,
        kind: &str,
        ids: Vec<String>,
        handler: impl ResultHandler<Vec<Entity>>,
    ) -> ClientResult<()> {
        validate_kind(kind)?;
        ids.iter().try_for_each(|id| require_id(id))?;
        let (store, credential) = (Arc::clone(&self.store), self.credential());
        let kind = kind.to_string();
        self.dispatcher.execute(
            async move { store.get_all(&kind, &ids, credential.as_ref()).await },
            handler,
        );
        Ok(())
    }

    pub fn delete(&self, kind: &str, id: &str, handler: impl ResultHandler<()>) -> ClientResult<()> {
        validate_kind(kind)?;
        require_id(id)?;
        let (store, credential) = (Arc::clone(&self.store), self.credential());
        let (kind, id) = (kind.to_string(), id.to_string());
        self.dispatcher.execute(
            async move { store.delete(&kind, &id, credential.as_ref()).await },
            handler,
        );
        Ok(())
    }

    pub fn delete_all(
        &self,
        kind: &str,
        ids: Vec<String>,
        handler: impl ResultHandler<()>,
    ) -> ClientResult<()> {
        validate_kind(kind)?;
        ids.iter().try_for_each(|id| require_id(id))?;
        let (store, credential) = (Arc::clone(&self.store), self.credential());
        let kind = kind.to_string();
        self.dispatcher.execute(
            async move { store.delete_all(&kind, &ids, credential.as_ref()).await },
            handler,
        );
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Runs a query.
    ///
    /// A continuous query (scope `FUTURE` or `FUTURE_AND_PAST`) is registered
    /// under its query id before it is dispatched, replacing any earlier
    /// subscription with the same id. Its handler then also receives the
    /// results of every refresh triggered by a push notification, until
    /// [`unsubscribe`](Self::unsubscribe).
    pub fn list(
        &self,
        query: CloudQuery,
        handler: impl ResultHandler<Vec<Entity>>,
    ) -> ClientResult<()> {
        let credential = self.credential();
        if !query.is_continuous() {
            let store = Arc::clone(&self.store);
            self.dispatcher.execute(
                async move { store.list(&query, credential.as_ref()).await },
                handler,
            );
            return Ok(());
        }

        let query = match self.registrar.as_ref().and_then(|r| r.registration_id()) {
            Some(reg_id) => query.with_registration_id(reg_id),
            None => query,
        };
        let query_id = query.query_id();
        let epoch = self.registry.register(
            query_id.clone(),
            Arc::new(handler),
            query.shadow(),
            credential.clone(),
        );
        debug!("Subscribing {query} as {query_id}");
        self.dispatch_continuous(query, credential, query_id, epoch);
        Ok(())
    }

    fn dispatch_continuous(
        &self,
        query: CloudQuery,
        credential: Option<Credential>,
        query_id: QueryId,
        epoch: u64,
    ) {
        let store = Arc::clone(&self.store);
        let registry = Arc::clone(&self.registry);
        self.dispatcher.execute(
            async move { store.list(&query, credential.as_ref()).await },
            move |result: ClientResult<Vec<Entity>>| {
                registry.deliver(&query_id, epoch, result);
            },
        );
    }

    /// Re-runs the continuous query a push notification refers to.
    ///
    /// Notifications for unknown query ids are logged and dropped.
    pub fn handle_push_notification(&self, notification: &PushNotification) {
        let query_id = &notification.query_id;
        match self.registry.refresh(query_id) {
            Some(refresh) => {
                debug!("Refreshing query {query_id}");
                self.dispatch_continuous(
                    refresh.query,
                    refresh.credential,
                    query_id.clone(),
                    refresh.epoch,
                );
            }
            None => info!("Ignoring push notification for unknown query {query_id}"),
        }
    }

    /// Drops the subscription for `query_id`. In-flight results for it are
    /// discarded. Returns whether it existed.
    pub fn unsubscribe(&self, query_id: &QueryId) -> bool {
        self.registry.unsubscribe(query_id)
    }

    /// Drops every subscription.
    pub fn clear_subscriptions(&self) {
        self.registry.clear();
    }

    /// Waits until every dispatched call has delivered its result.
    pub async fn wait_idle(&self) {
        self.dispatcher.wait_idle().await;
    }

    // ── Convenience queries ──────────────────────────────────────

    /// Lists entities of one kind, sorted by `sort_property`.
    pub fn list_by_kind(
        &self,
        kind: &str,
        sort_property: &str,
        order: Order,
        limit: u32,
        scope: Scope,
        handler: impl ResultHandler<Vec<Entity>>,
    ) -> ClientResult<()> {
        let query = CloudQuery::new(kind)?
            .with_sort(sort_property, order)
            .with_limit(limit)
            .with_scope(scope);
        self.list(query, handler)
    }

    /// Lists entities whose `property` compares to `value` with `op`, newest
    /// or oldest first by creation time.
    #[allow(clippy::too_many_arguments)]
    pub fn list_by_property(
        &self,
        kind: &str,
        property: &str,
        op: FilterOp,
        value: impl Into<Value>,
        order: Order,
        limit: u32,
        scope: Scope,
        handler: impl ResultHandler<Vec<Entity>>,
    ) -> ClientResult<()> {
        let query = CloudQuery::new(kind)?
            .with_filter(Filter::compare(op, property, value)?)?
            .with_sort(PROP_CREATED_AT, order)
            .with_limit(limit)
            .with_scope(scope);
        self.list(query, handler)
    }

    /// Fetches the most recently created entity of `kind` (at most one
    /// element).
    pub fn get_last_entity_of_kind(
        &self,
        kind: &str,
        scope: Scope,
        handler: impl ResultHandler<Vec<Entity>>,
    ) -> ClientResult<()> {
        self.list_by_kind(kind, PROP_CREATED_AT, Order::Desc, 1, scope, handler)
    }
}

fn require_persisted(entity: &Entity) -> ClientResult<()> {
    if !entity.is_persisted() {
        return Err(ClientError::InvalidArgument(format!(
            "{entity} has no id; insert it first"
        )));
    }
    Ok(())
}

fn require_id(id: &str) -> ClientResult<()> {
    if id.is_empty() {
        return Err(ClientError::InvalidArgument(
            "entity id must not be empty".to_string(),
        ));
    }
    Ok(())
}
