//! Entity store abstraction trait.

use crate::credential::Credential;
use crate::error::ClientResult;
use async_trait::async_trait;
use cloudlink_model::Entity;
use cloudlink_query::CloudQuery;

/// Remote schemaless entity store.
///
/// Every call carries the caller's credential, if any. Insert and update
/// return the store's copy of the entity, with id and audit fields filled in.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Stores a new entity.
    async fn insert(&self, entity: Entity, credential: Option<&Credential>) -> ClientResult<Entity>;

    /// Stores several new entities.
    async fn insert_all(
        &self,
        entities: Vec<Entity>,
        credential: Option<&Credential>,
    ) -> ClientResult<Vec<Entity>>;

    /// Replaces a stored entity.
    async fn update(&self, entity: Entity, credential: Option<&Credential>) -> ClientResult<Entity>;

    /// Replaces several stored entities.
    async fn update_all(
        &self,
        entities: Vec<Entity>,
        credential: Option<&Credential>,
    ) -> ClientResult<Vec<Entity>>;

    /// Fetches one entity.
    async fn get(&self, kind: &str, id: &str, credential: Option<&Credential>)
    -> ClientResult<Entity>;

    /// Fetches several entities of one kind. Unknown ids are skipped.
    async fn get_all(
        &self,
        kind: &str,
        ids: &[String],
        credential: Option<&Credential>,
    ) -> ClientResult<Vec<Entity>>;

    /// Deletes one entity.
    async fn delete(&self, kind: &str, id: &str, credential: Option<&Credential>)
    -> ClientResult<()>;

    /// Deletes several entities of one kind.
    async fn delete_all(
        &self,
        kind: &str,
        ids: &[String],
        credential: Option<&Credential>,
    ) -> ClientResult<()>;

    /// Runs a query. Continuous queries also register with the store's push
    /// machinery under their query id.
    async fn list(
        &self,
        query: &CloudQuery,
        credential: Option<&Credential>,
    ) -> ClientResult<Vec<Entity>>;
}
