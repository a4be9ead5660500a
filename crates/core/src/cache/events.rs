//! Durable FIFO buffer for outbound events awaiting delivery.

use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

use super::connection::CacheDb;
use crate::Error;

/// An opaque payload queued until it can be delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct BufferedEvent {
    /// Monotonic queue position; lower ids were enqueued first.
    pub id: i64,
    pub payload: serde_json::Value,
    pub created_at: String,
}

impl CacheDb {
    /// Append an event to the buffer. Returns its queue id.
    pub async fn enqueue_event(&self, payload: &serde_json::Value) -> Result<i64, Error> {
        let payload_json = serde_json::to_string(payload).map_err(|e| Error::InvalidInput(e.to_string()))?;
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    "INSERT INTO buffered_events (payload_json, created_at) VALUES (?1, ?2)",
                    params![payload_json, now],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from)
    }

    /// All buffered events in FIFO order, without removing them.
    pub async fn pending_events(&self) -> Result<Vec<BufferedEvent>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<BufferedEvent>, Error> {
                let mut stmt = conn.prepare("SELECT id, payload_json, created_at FROM buffered_events ORDER BY id")?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.into_iter()
                    .map(|(id, payload_json, created_at)| {
                        let payload = serde_json::from_str(&payload_json)
                            .map_err(|e| Error::CorruptEntry(format!("buffered event {id}: {e}")))?;
                        Ok(BufferedEvent { id, payload, created_at })
                    })
                    .collect()
            })
            .await
            .map_err(Error::from)
    }

    /// Remove every event with `id <= up_to`. Returns how many were removed.
    ///
    /// Events enqueued after a batch was read have larger ids and survive.
    pub async fn clear_events_through(&self, up_to: i64) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let deleted = conn.execute("DELETE FROM buffered_events WHERE id <= ?1", params![up_to])?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_enqueue_preserves_fifo_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.enqueue_event(&json!({"n": 1})).await.unwrap();
        db.enqueue_event(&json!({"n": 2})).await.unwrap();
        db.enqueue_event(&json!({"n": 3})).await.unwrap();

        let events = db.pending_events().await.unwrap();
        let order: Vec<i64> = events.iter().map(|e| e.payload["n"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_clear_through_keeps_later_events() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.enqueue_event(&json!("a")).await.unwrap();
        let second = db.enqueue_event(&json!("b")).await.unwrap();
        db.enqueue_event(&json!("c")).await.unwrap();

        assert_eq!(db.clear_events_through(second).await.unwrap(), 2);

        let remaining = db.pending_events().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].payload, json!("c"));
    }

    #[tokio::test]
    async fn test_pending_empty() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.pending_events().await.unwrap().is_empty());
    }
}
