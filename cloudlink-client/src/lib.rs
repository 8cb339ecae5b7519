//! Continuous queries and topic messaging for Cloudlink.
//!
//! # Architecture
//!
//! - **Dispatch**: every store call runs on a tokio task; results come back
//!   one at a time on a single callback context
//! - **Registry**: continuous queries are kept by query id together with
//!   their handler and the query to re-run on the next push notification
//! - **Backend**: entity CRUD, queries and push handling over an
//!   [`EntityStore`]
//! - **Messaging**: topics as continuous queries over the `_CloudMessages`
//!   kind, with per-topic bookmarks so reconnecting never replays or skips
//!   messages
//!
//! ## Refresh cycle
//!
//! 1. A continuous query is registered, then dispatched
//! 2. The store sends a push notification carrying the query id
//! 3. [`CloudBackend::handle_push_notification`] re-runs the registered query
//! 4. The results reach the original handler; the messaging layer moves the
//!    bookmark forward and re-arms the query from there
//!
//! # Example
//!
//! ```
//! use cloudlink_client::{ClientConfig, CloudBackend, InMemoryEntityStore};
//! use cloudlink_model::Entity;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> cloudlink_client::ClientResult<()> {
//! let store = Arc::new(InMemoryEntityStore::new());
//! let backend = CloudBackend::new(store.clone(), ClientConfig::default())?;
//!
//! let entity = Entity::new("Guestbook")?.with("message", "hello");
//! backend.insert(entity, ())?;
//! backend.wait_idle().await;
//! assert_eq!(store.len(), 1);
//! # Ok(())
//! # }
//! ```

mod backend;
pub mod bookmark;
pub mod clock;
mod config;
pub mod credential;
pub mod dispatch;
mod error;
pub mod messaging;
pub mod push;
pub mod registry;
pub mod store;

pub use backend::CloudBackend;
pub use bookmark::{BookmarkStore, MemoryBookmarkStore, SqliteBookmarkStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClientConfig, DEFAULT_MAX_CONCURRENT_CALLS, DEFAULT_MAX_MESSAGES};
pub use credential::{BearerToken, Credential, CredentialProvider};
pub use dispatch::{Dispatcher, ResultHandler};
pub use error::{ClientError, ClientResult};
pub use messaging::CloudMessaging;
pub use push::{PushNotification, PushRegistrar, StaticRegistrar};
pub use registry::{ContinuousQueryRegistry, Refresh, SubscriptionState};
pub use store::{EntityStore, HttpEntityStore, HttpStoreConfig, InMemoryEntityStore};
