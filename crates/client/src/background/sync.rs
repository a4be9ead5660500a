//! Buffered outbound events and their at-least-once delivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use edgecache_core::{BufferedEvent, CacheDb, Error};
use reqwest::Client;
use serde::Serialize;
use url::Url;

use crate::fetch::map_reqwest_error;

/// Destination for a batch of buffered events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, tag: &str, events: &[BufferedEvent]) -> Result<(), Error>;
}

#[derive(Serialize)]
struct Batch<'a> {
    tag: &'a str,
    events: &'a [BufferedEvent],
}

/// POSTs each batch as JSON. Anything but a 2xx is a failed delivery.
#[derive(Debug, Clone)]
pub struct HttpEventSink {
    http: Client,
    url: Url,
}

impl HttpEventSink {
    pub fn new(url: Url, user_agent: &str, timeout: Duration) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    async fn deliver(&self, tag: &str, events: &[BufferedEvent]) -> Result<(), Error> {
        let response = self
            .http
            .post(self.url.clone())
            .json(&Batch { tag, events })
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::SyncFailed(format!("sink answered {}", status.as_u16())));
        }
        Ok(())
    }
}

/// Emitter side of the buffer, handed to collaborators that produce events.
#[derive(Debug, Clone)]
pub struct EventQueue {
    db: CacheDb,
}

impl EventQueue {
    pub fn new(db: CacheDb) -> Self {
        Self { db }
    }

    pub async fn enqueue(&self, payload: &serde_json::Value) -> Result<i64, Error> {
        let id = self.db.enqueue_event(payload).await?;
        tracing::debug!(id, "event buffered");
        Ok(id)
    }

    pub async fn pending(&self) -> Result<Vec<BufferedEvent>, Error> {
        self.db.pending_events().await
    }
}

/// Drains the buffer into an [`EventSink`].
#[derive(Clone)]
pub struct EventSync {
    db: CacheDb,
    sink: Arc<dyn EventSink>,
    tag: String,
}

impl EventSync {
    pub fn new(db: CacheDb, sink: Arc<dyn EventSink>, tag: impl Into<String>) -> Self {
        Self { db, sink, tag: tag.into() }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Deliver everything buffered so far as one batch.
    ///
    /// Only the delivered events are removed, so anything enqueued while the
    /// sink was working stays for the next run. On failure the buffer is left
    /// as it was. Returns the number of events delivered.
    pub async fn run(&self) -> Result<usize, Error> {
        let events = self.db.pending_events().await?;
        let Some(last) = events.last().map(|e| e.id) else {
            tracing::trace!(tag = %self.tag, "no buffered events");
            return Ok(0);
        };

        if let Err(e) = self.sink.deliver(&self.tag, &events).await {
            tracing::warn!(tag = %self.tag, pending = events.len(), error = %e, "event delivery failed, keeping buffer");
            return Err(Error::SyncFailed(e.to_string()));
        }

        let cleared = self.db.clear_events_through(last).await?;
        tracing::info!(tag = %self.tag, delivered = events.len(), cleared, "buffered events synced");
        Ok(events.len())
    }
}

impl std::fmt::Debug for EventSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSync").field("tag", &self.tag).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn queue() -> EventQueue {
        EventQueue::new(CacheDb::open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_empty_queue_is_noop() {
        let queue = queue().await;
        let sink = Arc::new(RecordingSink::default());
        let sync = EventSync::new(queue.db.clone(), sink.clone(), "sync-events");

        assert_eq!(sync.run().await.unwrap(), 0);
        assert!(sink.batches().is_empty());
    }

    #[tokio::test]
    async fn test_success_clears_delivered_events() {
        let queue = queue().await;
        queue.enqueue(&json!({"n": 1})).await.unwrap();
        queue.enqueue(&json!({"n": 2})).await.unwrap();
        let sink = Arc::new(RecordingSink::default());
        let sync = EventSync::new(queue.db.clone(), sink.clone(), "sync-events");

        assert_eq!(sync.run().await.unwrap(), 2);
        assert!(queue.pending().await.unwrap().is_empty());

        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].0, "sync-events");
        let payloads: Vec<_> = batches[0].1.iter().map(|e| e.payload.clone()).collect();
        assert_eq!(payloads, vec![json!({"n": 1}), json!({"n": 2})]);
    }

    #[tokio::test]
    async fn test_failure_keeps_buffer() {
        let queue = queue().await;
        queue.enqueue(&json!({"n": 1})).await.unwrap();
        let sink = Arc::new(RecordingSink::default());
        sink.fail(true);
        let sync = EventSync::new(queue.db.clone(), sink.clone(), "sync-events");

        assert!(matches!(sync.run().await, Err(Error::SyncFailed(_))));
        assert_eq!(queue.pending().await.unwrap().len(), 1);

        sink.fail(false);
        assert_eq!(sync.run().await.unwrap(), 1);
        assert!(queue.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_http_sink_posts_tagged_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/events"))
            .and(body_partial_json(json!({"tag": "sync-events", "events": [{"payload": {"n": 1}}]})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let queue = queue().await;
        queue.enqueue(&json!({"n": 1})).await.unwrap();
        let url = Url::parse(&format!("{}/events", server.uri())).unwrap();
        let sink = Arc::new(HttpEventSink::new(url, "edgecache/test", Duration::from_secs(5)).unwrap());
        let sync = EventSync::new(queue.db.clone(), sink, "sync-events");

        assert_eq!(sync.run().await.unwrap(), 1);
        assert!(queue.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_http_sink_rejection_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let sink = HttpEventSink::new(url, "edgecache/test", Duration::from_secs(5)).unwrap();
        let event = BufferedEvent { id: 1, payload: json!({}), created_at: "2026-01-01T00:00:00Z".into() };

        assert!(matches!(sink.deliver("sync-events", &[event]).await, Err(Error::SyncFailed(_))));
    }
}
