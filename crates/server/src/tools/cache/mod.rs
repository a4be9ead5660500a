//! Cache inspection and maintenance tools.

pub mod get;
pub mod namespaces;
pub mod purge;

pub use get::{CacheGetParams, get_impl};
pub use namespaces::namespaces_impl;
pub use purge::{CachePurgeParams, purge_impl};
