//! SQLite-backed store for cache namespaces, entries, and buffered events.
//!
//! This module provides a persistent cache using SQLite with async access via
//! tokio-rusqlite. It supports:
//!
//! - Named, versioned namespaces that are created, listed, and deleted whole
//! - Entries addressed by the SHA-256 digest of their request key
//! - A FIFO buffer of outbound events for deferred delivery
//! - Automatic schema migrations and WAL mode

pub mod connection;
pub mod entries;
pub mod events;
pub mod key;
pub mod migrations;
pub mod namespaces;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{CAPTURED_AT_HEADER, CacheEntry};
pub use events::BufferedEvent;
pub use key::RequestKey;
pub use namespaces::{NamespaceKind, NamespaceStats, VersionTags};
