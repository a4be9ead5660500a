//! Core types and shared functionality for edgecache.
//!
//! This crate provides:
//! - The SQLite-backed namespace/entry store and event buffer
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{BufferedEvent, CacheDb, CacheEntry, NamespaceKind, RequestKey, VersionTags};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
