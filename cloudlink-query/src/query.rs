//! Query descriptors and their identity.

use crate::error::{QueryError, QueryResult};
use crate::filter::{Filter, FilterDto};
use cloudlink_model::validate_kind;
use cloudlink_types::QueryId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// When results are delivered relative to the moment the query is issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    /// Entities that exist now. One-shot.
    #[default]
    Past,
    /// Only entities stored after the query is issued.
    Future,
    /// Entities that exist now, then a live stream of new ones.
    FutureAndPast,
}

impl Scope {
    pub fn is_continuous(&self) -> bool {
        !matches!(self, Scope::Past)
    }

    pub fn includes_past(&self) -> bool {
        !matches!(self, Scope::Future)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sort {
    pub property: String,
    pub order: Order,
}

/// A query against one entity kind.
///
/// Built with the `with_*` methods. Two queries with the same kind, filter,
/// sort, limit, scope and subscription duration share a [`QueryId`] unless one
/// was given explicitly with [`CloudQuery::with_query_id`].
#[derive(Debug, Clone, PartialEq)]
pub struct CloudQuery {
    kind_name: String,
    filter: Option<Filter>,
    sort: Option<Sort>,
    limit: Option<u32>,
    scope: Scope,
    subscription_duration_secs: u64,
    query_id: Option<QueryId>,
    registration_id: Option<String>,
}

/// Fields that contribute to the derived identity, in declaration order.
#[derive(Serialize)]
struct Canonical<'a> {
    kind_name: &'a str,
    filter: Option<FilterDto>,
    sort: Option<&'a Sort>,
    limit: Option<u32>,
    scope: Scope,
    subscription_duration_secs: u64,
}

impl CloudQuery {
    pub fn new(kind: impl Into<String>) -> QueryResult<Self> {
        let kind_name = kind.into();
        validate_kind(&kind_name)?;
        Ok(Self {
            kind_name,
            filter: None,
            sort: None,
            limit: None,
            scope: Scope::default(),
            subscription_duration_secs: 0,
            query_id: None,
            registration_id: None,
        })
    }

    /// Sets the filter after validating it.
    pub fn with_filter(mut self, filter: Filter) -> QueryResult<Self> {
        filter.validate()?;
        self.filter = Some(filter);
        Ok(self)
    }

    #[must_use]
    pub fn with_sort(mut self, property: impl Into<String>, order: Order) -> Self {
        self.sort = Some(Sort {
            property: property.into(),
            order,
        });
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// How long the store keeps the subscription alive. Zero means
    /// indefinitely.
    #[must_use]
    pub fn with_subscription_duration(mut self, secs: u64) -> Self {
        self.subscription_duration_secs = secs;
        self
    }

    /// Overrides the derived identity.
    #[must_use]
    pub fn with_query_id(mut self, query_id: QueryId) -> Self {
        self.query_id = Some(query_id);
        self
    }

    #[must_use]
    pub fn with_registration_id(mut self, registration_id: impl Into<String>) -> Self {
        self.registration_id = Some(registration_id.into());
        self
    }

    pub fn kind_name(&self) -> &str {
        &self.kind_name
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn sort(&self) -> Option<&Sort> {
        self.sort.as_ref()
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn subscription_duration_secs(&self) -> u64 {
        self.subscription_duration_secs
    }

    pub fn registration_id(&self) -> Option<&str> {
        self.registration_id.as_deref()
    }

    /// Whether the query has an explicit identity.
    pub fn has_explicit_query_id(&self) -> bool {
        self.query_id.is_some()
    }

    pub fn is_continuous(&self) -> bool {
        self.scope.is_continuous()
    }

    /// The explicit identity if set, otherwise one derived from the
    /// descriptor's content.
    pub fn query_id(&self) -> QueryId {
        if let Some(id) = &self.query_id {
            return id.clone();
        }
        let digest = Sha256::digest(self.canonical_form().as_bytes());
        QueryId::from_digest(&digest)
    }

    /// Deterministic rendering of the identity-bearing fields.
    pub fn canonical_form(&self) -> String {
        let canonical = Canonical {
            kind_name: &self.kind_name,
            filter: self.filter.as_ref().map(Filter::to_dto),
            sort: self.sort.as_ref(),
            limit: self.limit,
            scope: self.scope,
            subscription_duration_secs: self.subscription_duration_secs,
        };
        serde_json::to_string(&canonical).unwrap_or_else(|_| {
            format!(
                "{}|{:?}|{:?}|{:?}|{:?}|{}",
                self.kind_name,
                self.filter,
                self.sort,
                self.limit,
                self.scope,
                self.subscription_duration_secs
            )
        })
    }

    /// The one-shot copy used to re-fetch after a push notification.
    ///
    /// Scope becomes [`Scope::Past`] and the original's identity is pinned,
    /// so results of the shadow are routed to the original subscription.
    pub fn shadow(&self) -> CloudQuery {
        CloudQuery {
            kind_name: self.kind_name.clone(),
            filter: self.filter.clone(),
            sort: self.sort.clone(),
            limit: self.limit,
            scope: Scope::Past,
            subscription_duration_secs: self.subscription_duration_secs,
            query_id: Some(self.query_id()),
            registration_id: None,
        }
    }

    pub fn to_dto(&self) -> QueryDto {
        QueryDto {
            kind_name: self.kind_name.clone(),
            filter_dto: self.filter.as_ref().map(Filter::to_dto),
            sorted_property_name: self.sort.as_ref().map(|s| s.property.clone()),
            sort_ascending: self.sort.as_ref().map(|s| s.order == Order::Asc),
            limit: self.limit,
            scope: self.scope,
            subscription_duration_sec: self.subscription_duration_secs,
            query_id: self.query_id().to_string(),
            reg_id: self.registration_id.clone(),
        }
    }
}

impl fmt::Display for CloudQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{:?}]", self.kind_name, self.scope)?;
        if let Some(filter) = &self.filter {
            write!(f, " where {filter}")?;
        }
        if let Some(sort) = &self.sort {
            write!(f, " order by {} {:?}", sort.property, sort.order)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " limit {limit}")?;
        }
        Ok(())
    }
}

/// Wire form of a [`CloudQuery`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDto {
    pub kind_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_dto: Option<FilterDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sorted_property_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_ascending: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub subscription_duration_sec: u64,
    pub query_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reg_id: Option<String>,
}

impl TryFrom<QueryDto> for CloudQuery {
    type Error = QueryError;

    fn try_from(dto: QueryDto) -> QueryResult<Self> {
        let mut query = CloudQuery::new(dto.kind_name)?
            .with_scope(dto.scope)
            .with_subscription_duration(dto.subscription_duration_sec)
            .with_query_id(QueryId::parse(&dto.query_id)?);
        if let Some(filter) = dto.filter_dto {
            query = query.with_filter(Filter::try_from(filter)?)?;
        }
        if let Some(property) = dto.sorted_property_name {
            let order = if dto.sort_ascending.unwrap_or(true) {
                Order::Asc
            } else {
                Order::Desc
            };
            query = query.with_sort(property, order);
        }
        if let Some(limit) = dto.limit {
            query = query.with_limit(limit);
        }
        if let Some(reg_id) = dto.reg_id {
            query = query.with_registration_id(reg_id);
        }
        Ok(query)
    }
}
