//! Periodic removal of old dynamic-namespace entries.

use chrono::{DateTime, Duration, Utc};
use edgecache_core::{CacheDb, Error};

use crate::state::ProxyState;

/// Deletes dynamic entries captured longer ago than the threshold.
#[derive(Debug, Clone)]
pub struct ExpirySweep {
    db: CacheDb,
    namespace: String,
    threshold: Duration,
}

impl ExpirySweep {
    pub fn new(state: &ProxyState, threshold: Duration) -> Self {
        Self { db: state.db().clone(), namespace: state.dynamic_namespace(), threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub async fn run(&self) -> Result<u64, Error> {
        self.run_at(Utc::now()).await
    }

    /// Sweep as of `now`. Entries whose age is strictly greater than the
    /// threshold go; entries with no readable capture time stay.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let entries = match self.db.list_entries(&self.namespace).await {
            Ok(entries) => entries,
            Err(Error::NamespaceNotFound(_)) => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut deleted = 0;
        for entry in entries {
            let Some(captured_at) = entry.captured_at() else {
                tracing::debug!(key = %entry.key, "entry has no capture time, keeping");
                continue;
            };
            if now - captured_at > self.threshold && self.db.delete_entry(&self.namespace, &entry.key).await? {
                deleted += 1;
            }
        }

        tracing::info!(namespace = %self.namespace, deleted, "expiry sweep complete");
        Ok(deleted)
    }
}
