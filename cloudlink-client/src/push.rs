//! Push notification plumbing.
//!
//! The push transport itself is out of scope; it only has to hand over "a
//! notification for this query id arrived" and supply the device's
//! registration id.

use cloudlink_types::QueryId;

/// Subscription id segment marking a continuous-query notification.
const QUERY_SUB_TYPE: &str = "query";

/// A notification that a continuous query has new results.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PushNotification {
    pub query_id: QueryId,
}

impl PushNotification {
    pub fn new(query_id: QueryId) -> Self {
        Self { query_id }
    }

    /// Parses a transport subscription id of the form
    /// `<prefix>:query:<queryId>`.
    ///
    /// Returns `None` for other subscription types and malformed ids.
    pub fn from_sub_id(sub_id: &str) -> Option<Self> {
        let mut parts = sub_id.splitn(3, ':');
        let _prefix = parts.next()?;
        if parts.next()? != QUERY_SUB_TYPE {
            return None;
        }
        let query_id = QueryId::parse(parts.next()?).ok()?;
        Some(Self::new(query_id))
    }

    /// Builds the subscription id the store attaches to notifications for
    /// `query_id`.
    pub fn sub_id(prefix: &str, query_id: &QueryId) -> String {
        format!("{prefix}:{QUERY_SUB_TYPE}:{query_id}")
    }
}

/// Supplies the push registration id stamped on continuous queries so the
/// store knows where to send their notifications.
pub trait PushRegistrar: Send + Sync {
    /// `None` while the device has not registered with the push service.
    fn registration_id(&self) -> Option<String>;
}

/// A registrar with a fixed id.
#[derive(Debug, Clone)]
pub struct StaticRegistrar(pub String);

impl PushRegistrar for StaticRegistrar {
    fn registration_id(&self) -> Option<String> {
        Some(self.0.clone())
    }
}
