//! Remote entity stores.
//!
//! The client talks to the store only through the [`EntityStore`] trait.
//! [`HttpEntityStore`] speaks the JSON endpoint protocol; [`InMemoryEntityStore`]
//! evaluates queries locally and is what the test suites run against.

pub mod entity_store;
pub mod http;
pub mod memory;

pub use entity_store::EntityStore;
pub use http::{HttpEntityStore, HttpStoreConfig};
pub use memory::InMemoryEntityStore;
