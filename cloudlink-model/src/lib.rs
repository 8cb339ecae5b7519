//! Core entity model for Cloudlink.
//!
//! Defines the record type exchanged with the remote entity store:
//! - [`Entity`]: kind, store-assigned identity and audit fields, typed properties
//! - [`Value`]: the closed set of property value types
//! - [`ModelError`]: validation failures raised before anything reaches the store
//!
//! The query and client crates depend on these types; the store never sees
//! anything that has not passed [`validate_kind`].

mod entity;
mod error;
mod value;

pub use entity::{
    Entity, PROP_CREATED_AT, PROP_CREATED_BY, PROP_OWNER, PROP_UPDATED_AT, PROP_UPDATED_BY,
    validate_kind,
};
pub use error::{ModelError, ModelResult};
pub use value::Value;
