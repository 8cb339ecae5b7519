//! Filter expressions and query descriptors for Cloudlink.
//!
//! A [`CloudQuery`] names a kind, an optional [`Filter`] tree, sort order,
//! limit and [`Scope`]. Queries whose scope reaches into the future are
//! *continuous*: the store keeps them registered and sends a push
//! notification carrying the query's [`QueryId`](cloudlink_types::QueryId)
//! whenever a matching entity changes.
//!
//! # Example
//!
//! ```
//! use cloudlink_query::{CloudQuery, Filter, Order, Scope};
//!
//! let query = CloudQuery::new("Guestbook")
//!     .unwrap()
//!     .with_filter(Filter::and([
//!         Filter::eq("public", true),
//!         Filter::ge("stars", 4),
//!     ]).unwrap())
//!     .unwrap()
//!     .with_sort("_createdAt", Order::Desc)
//!     .with_limit(50)
//!     .with_scope(Scope::FutureAndPast);
//!
//! assert!(query.is_continuous());
//! assert_eq!(query.query_id(), query.clone().query_id());
//! ```

mod error;
mod filter;
mod query;

pub use error::{QueryError, QueryResult};
pub use filter::{Filter, FilterDto, FilterOp, FilterValue};
pub use query::{CloudQuery, Order, QueryDto, Scope, Sort};
