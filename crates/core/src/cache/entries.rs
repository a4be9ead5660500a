//! Cache entry reads and writes.
//!
//! Entries are immutable once written: `put_entry` replaces the whole row,
//! it never patches individual fields.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

use super::connection::CacheDb;
use super::key::RequestKey;
use crate::Error;

/// Header carrying the time an entry was captured from origin (RFC 3339, UTC).
pub const CAPTURED_AT_HEADER: &str = "x-edgecache-captured-at";

/// A cached response.
///
/// This is also the persisted/transmitted envelope shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: RequestKey,
    pub status: u16,
    /// Lowercased header names. Always contains [`CAPTURED_AT_HEADER`] when
    /// built through [`CacheEntry::capture`].
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl CacheEntry {
    /// Build an entry from an origin response, stamping the capture time.
    pub fn capture(
        key: RequestKey, status: u16, headers: impl IntoIterator<Item = (String, String)>, body: Vec<u8>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        let mut headers: BTreeMap<String, String> =
            headers.into_iter().map(|(k, v)| (k.to_ascii_lowercase(), v)).collect();
        headers.insert(
            CAPTURED_AT_HEADER.to_string(),
            captured_at.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
        );
        Self { key, status, headers, body }
    }

    /// Capture time read back from the headers, if present and well-formed.
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.headers
            .get(CAPTURED_AT_HEADER)
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

type EntryRow = (String, i64, String, Vec<u8>);

fn decode_row(row: EntryRow) -> Result<CacheEntry, Error> {
    let (key, status, headers_json, body) = row;
    let key = RequestKey::parse(&key).map_err(|e| Error::CorruptEntry(e.to_string()))?;
    let status = u16::try_from(status).map_err(|_| Error::CorruptEntry(format!("status {status} out of range")))?;
    let headers = serde_json::from_str(&headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;
    Ok(CacheEntry { key, status, headers, body })
}

fn require_namespace(conn: &rusqlite::Connection, name: &str) -> Result<(), Error> {
    let exists: bool =
        conn.query_row("SELECT EXISTS(SELECT 1 FROM namespaces WHERE name = ?1)", params![name], |row| row.get(0))?;
    if exists { Ok(()) } else { Err(Error::NamespaceNotFound(name.to_string())) }
}

fn upsert(conn: &rusqlite::Connection, namespace: &str, entry: &CacheEntry, now: &str) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&entry.headers).map_err(|e| Error::InvalidInput(e.to_string()))?;
    conn.execute(
        "INSERT OR IGNORE INTO namespaces (name, created_at) VALUES (?1, ?2)",
        params![namespace, now],
    )?;
    conn.execute(
        "INSERT INTO entries (namespace, key_hash, request_key, status, headers_json, body, stored_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(namespace, key_hash) DO UPDATE SET
            request_key = excluded.request_key,
            status = excluded.status,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            namespace,
            entry.key.digest(),
            entry.key.to_string(),
            i64::from(entry.status),
            headers_json,
            &entry.body,
            now,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Look up an entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NamespaceNotFound`] if the namespace does not exist;
    /// callers on the request path treat that as an empty cache.
    pub async fn match_entry(&self, namespace: &str, key: &RequestKey) -> Result<Option<CacheEntry>, Error> {
        let namespace = namespace.to_string();
        let digest = key.digest();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                require_namespace(conn, &namespace)?;
                let row = conn.query_row(
                    "SELECT request_key, status, headers_json, body FROM entries
                     WHERE namespace = ?1 AND key_hash = ?2",
                    params![namespace, digest],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                );
                match row {
                    Ok(row) => decode_row(row).map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Write an entry, replacing any previous entry for the same key.
    ///
    /// Creates the namespace if it does not exist yet.
    pub async fn put_entry(&self, namespace: &str, entry: &CacheEntry) -> Result<(), Error> {
        self.put_entries(namespace, std::slice::from_ref(entry)).await
    }

    /// Write several entries in one transaction: all of them land or none do.
    pub async fn put_entries(&self, namespace: &str, entries: &[CacheEntry]) -> Result<(), Error> {
        let namespace = namespace.to_string();
        let entries = entries.to_vec();
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for entry in &entries {
                    upsert(&tx, &namespace, entry, &now)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Every entry in a namespace, in key order.
    pub async fn list_entries(&self, namespace: &str) -> Result<Vec<CacheEntry>, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<CacheEntry>, Error> {
                require_namespace(conn, &namespace)?;
                let mut stmt = conn.prepare(
                    "SELECT request_key, status, headers_json, body FROM entries
                     WHERE namespace = ?1 ORDER BY request_key",
                )?;
                let rows = stmt
                    .query_map(params![namespace], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
                    .collect::<Result<Vec<EntryRow>, _>>()?;
                rows.into_iter().map(decode_row).collect()
            })
            .await
            .map_err(Error::from)
    }

    /// Delete one entry. Returns false if there was nothing to delete.
    pub async fn delete_entry(&self, namespace: &str, key: &RequestKey) -> Result<bool, Error> {
        let namespace = namespace.to_string();
        let digest = key.digest();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE namespace = ?1 AND key_hash = ?2",
                    params![namespace, digest],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn count_entries(&self, namespace: &str) -> Result<u64, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE namespace = ?1", params![namespace], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
