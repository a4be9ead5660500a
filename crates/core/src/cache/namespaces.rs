//! Named, versioned cache regions.
//!
//! A namespace is the unit of installation and cutover: the lifecycle
//! controller pre-warms one per static version and deletes every namespace
//! that no longer matches the current version tags.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

use super::connection::CacheDb;
use crate::Error;

/// The two kinds of namespace the proxy maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceKind {
    /// Pre-warmed from the manifest at install, read-mostly afterwards.
    Static,
    /// Filled by request traffic and swept for staleness.
    Dynamic,
}

impl NamespaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NamespaceKind::Static => "static",
            NamespaceKind::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current version tags. Changing either one retires the previous generation
/// of that kind on the next activate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTags {
    pub prefix: String,
    pub static_version: String,
    pub dynamic_version: String,
}

impl VersionTags {
    pub fn new(prefix: impl Into<String>, static_version: impl Into<String>, dynamic_version: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), static_version: static_version.into(), dynamic_version: dynamic_version.into() }
    }

    /// Namespace name for the given kind at its current version.
    pub fn namespace(&self, kind: NamespaceKind) -> String {
        let version = match kind {
            NamespaceKind::Static => &self.static_version,
            NamespaceKind::Dynamic => &self.dynamic_version,
        };
        format!("{}-{}-{}", self.prefix, kind, version)
    }

    pub fn static_namespace(&self) -> String {
        self.namespace(NamespaceKind::Static)
    }

    pub fn dynamic_namespace(&self) -> String {
        self.namespace(NamespaceKind::Dynamic)
    }

    /// True if `name` is one of the two current namespaces.
    pub fn is_current(&self, name: &str) -> bool {
        name == self.static_namespace() || name == self.dynamic_namespace()
    }
}

/// Summary of one namespace for inspection tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NamespaceStats {
    pub name: String,
    pub created_at: String,
    pub entries: u64,
    pub body_bytes: u64,
}

impl CacheDb {
    /// Open a namespace, creating it if it does not exist.
    pub async fn open_namespace(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO namespaces (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn namespace_exists(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM namespaces WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every namespace currently in the store.
    pub async fn list_namespaces(&self) -> Result<BTreeSet<String>, Error> {
        self.conn
            .call(|conn| -> Result<BTreeSet<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM namespaces")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<BTreeSet<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a namespace and all of its entries.
    ///
    /// A single statement; entries go with it via `ON DELETE CASCADE`, so a
    /// concurrent reader sees either the whole namespace or none of it.
    /// Returns false if the namespace did not exist.
    pub async fn delete_namespace(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM namespaces WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Entry counts and body sizes per namespace, ordered by name.
    pub async fn namespace_stats(&self) -> Result<Vec<NamespaceStats>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<NamespaceStats>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT n.name, n.created_at, COUNT(e.key_hash), COALESCE(SUM(LENGTH(e.body)), 0)
                     FROM namespaces n
                     LEFT JOIN entries e ON e.namespace = n.name
                     GROUP BY n.name
                     ORDER BY n.name",
                )?;
                let stats = stmt
                    .query_map([], |row| {
                        Ok(NamespaceStats {
                            name: row.get(0)?,
                            created_at: row.get(1)?,
                            entries: row.get::<_, i64>(2)? as u64,
                            body_bytes: row.get::<_, i64>(3)? as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(stats)
            })
            .await
            .map_err(Error::from)
    }
}
