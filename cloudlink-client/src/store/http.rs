//! HTTP entity store.
//!
//! Speaks the JSON endpoint protocol under
//! `{endpoint_root_url}/mobilebackend/v1/CloudEntities`. Timestamps travel as
//! RFC 3339 strings.

use super::entity_store::EntityStore;
use crate::credential::{BearerToken, Credential};
use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use cloudlink_model::{Entity, Value, validate_kind};
use cloudlink_query::CloudQuery;
use cloudlink_types::Timestamp;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

const ENTITIES_PATH: &str = "mobilebackend/v1/CloudEntities";

/// HTTP store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpStoreConfig {
    /// Base URL of the backend, e.g. `https://my-app.example.com`.
    pub endpoint_root_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            endpoint_root_url: "http://localhost:8080".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Entity as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntityDto {
    kind_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
    #[serde(default)]
    properties: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntityListDto {
    #[serde(default)]
    entries: Vec<EntityDto>,
}

fn format_timestamp(ts: Timestamp) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(ts.as_millis())
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn parse_timestamp(s: &str) -> ClientResult<Timestamp> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| Timestamp::from_millis(dt.timestamp_millis()))
        .map_err(|e| ClientError::RemoteIo(format!("invalid timestamp {s:?}: {e}")))
}

impl From<&Entity> for EntityDto {
    fn from(entity: &Entity) -> Self {
        Self {
            kind_name: entity.kind().to_string(),
            id: entity.id.clone(),
            created_at: entity.created_at.and_then(format_timestamp),
            updated_at: entity.updated_at.and_then(format_timestamp),
            created_by: entity.created_by.clone(),
            updated_by: entity.updated_by.clone(),
            owner: entity.owner.clone(),
            properties: entity.properties.clone(),
        }
    }
}

impl EntityDto {
    fn reference(kind: &str, id: &str) -> Self {
        Self {
            kind_name: kind.to_string(),
            id: Some(id.to_string()),
            created_at: None,
            updated_at: None,
            created_by: None,
            updated_by: None,
            owner: None,
            properties: BTreeMap::new(),
        }
    }

    fn into_entity(self) -> ClientResult<Entity> {
        let mut entity = Entity::new(self.kind_name)
            .map_err(|e| ClientError::RemoteIo(format!("store returned a bad entity: {e}")))?;
        entity.id = self.id;
        entity.created_at = self.created_at.as_deref().map(parse_timestamp).transpose()?;
        entity.updated_at = self.updated_at.as_deref().map(parse_timestamp).transpose()?;
        entity.created_by = self.created_by;
        entity.updated_by = self.updated_by;
        entity.owner = self.owner;
        entity.properties = self.properties;
        Ok(entity)
    }
}

impl EntityListDto {
    fn from_entities(entities: &[Entity]) -> Self {
        Self {
            entries: entities.iter().map(EntityDto::from).collect(),
        }
    }

    fn references(kind: &str, ids: &[String]) -> Self {
        Self {
            entries: ids.iter().map(|id| EntityDto::reference(kind, id)).collect(),
        }
    }

    fn into_entities(self) -> ClientResult<Vec<Entity>> {
        self.entries.into_iter().map(EntityDto::into_entity).collect()
    }
}

/// Entity store reached over HTTP.
pub struct HttpEntityStore {
    config: HttpStoreConfig,
    client: Client,
}

impl HttpEntityStore {
    /// Creates a store client.
    pub fn new(config: HttpStoreConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &HttpStoreConfig {
        &self.config
    }

    /// `{kind}/{id}` with both segments percent-encoded.
    fn entity_url(&self, kind: &str, id: &str) -> String {
        self.url(&format!(
            "{}/{}",
            urlencoding::encode(kind),
            urlencoding::encode(id)
        ))
    }

    fn url(&self, tail: &str) -> String {
        format!(
            "{}/{ENTITIES_PATH}/{tail}",
            self.config.endpoint_root_url.trim_end_matches('/')
        )
    }

    fn authorize(request: RequestBuilder, credential: Option<&Credential>) -> RequestBuilder {
        match credential.and_then(|c| c.downcast_ref::<BearerToken>()) {
            Some(token) => request.bearer_auth(token.token()),
            None => request,
        }
    }

    async fn send(
        &self,
        request: RequestBuilder,
        credential: Option<&Credential>,
    ) -> ClientResult<Response> {
        let response = Self::authorize(request, credential).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!("Entity store answered {status}: {body}");
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(body));
        }
        Err(ClientError::RemoteIo(format!("{status}: {body}")))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        credential: Option<&Credential>,
    ) -> ClientResult<T> {
        let response = self.send(request, credential).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn post_entity(
        &self,
        action: &str,
        entity: &Entity,
        credential: Option<&Credential>,
    ) -> ClientResult<Entity> {
        let request = self
            .client
            .post(self.url(&format!("{action}/{}", urlencoding::encode(entity.kind()))))
            .json(&EntityDto::from(entity));
        let dto: EntityDto = self.send_json(request, credential).await?;
        dto.into_entity()
    }

    async fn post_list(
        &self,
        action: &str,
        body: &EntityListDto,
        credential: Option<&Credential>,
    ) -> ClientResult<Vec<Entity>> {
        let request = self.client.post(self.url(action)).json(body);
        let list: EntityListDto = self.send_json(request, credential).await?;
        list.into_entities()
    }
}

#[async_trait]
impl EntityStore for HttpEntityStore {
    async fn insert(&self, entity: Entity, credential: Option<&Credential>) -> ClientResult<Entity> {
        self.post_entity("insert", &entity, credential).await
    }

    async fn insert_all(
        &self,
        entities: Vec<Entity>,
        credential: Option<&Credential>,
    ) -> ClientResult<Vec<Entity>> {
        self.post_list("insertAll", &EntityListDto::from_entities(&entities), credential)
            .await
    }

    async fn update(&self, entity: Entity, credential: Option<&Credential>) -> ClientResult<Entity> {
        self.post_entity("update", &entity, credential).await
    }

    async fn update_all(
        &self,
        entities: Vec<Entity>,
        credential: Option<&Credential>,
    ) -> ClientResult<Vec<Entity>> {
        self.post_list("updateAll", &EntityListDto::from_entities(&entities), credential)
            .await
    }

    async fn get(&self, kind: &str, id: &str, credential: Option<&Credential>) -> ClientResult<Entity> {
        validate_kind(kind)?;
        let request = self.client.get(self.entity_url(kind, id));
        let dto: EntityDto = self.send_json(request, credential).await?;
        dto.into_entity()
    }

    async fn get_all(
        &self,
        kind: &str,
        ids: &[String],
        credential: Option<&Credential>,
    ) -> ClientResult<Vec<Entity>> {
        validate_kind(kind)?;
        self.post_list("getAll", &EntityListDto::references(kind, ids), credential)
            .await
    }

    async fn delete(&self, kind: &str, id: &str, credential: Option<&Credential>) -> ClientResult<()> {
        validate_kind(kind)?;
        let request = self.client.delete(self.entity_url(kind, id));
        self.send(request, credential).await?;
        Ok(())
    }

    async fn delete_all(
        &self,
        kind: &str,
        ids: &[String],
        credential: Option<&Credential>,
    ) -> ClientResult<()> {
        validate_kind(kind)?;
        let request = self
            .client
            .post(self.url("deleteAll"))
            .json(&EntityListDto::references(kind, ids));
        self.send(request, credential).await?;
        Ok(())
    }

    async fn list(
        &self,
        query: &CloudQuery,
        credential: Option<&Credential>,
    ) -> ClientResult<Vec<Entity>> {
        debug!("Listing {query}");
        let request = self.client.post(self.url("list")).json(&query.to_dto());
        let list: EntityListDto = self.send_json(request, credential).await?;
        list.into_entities()
    }
}
