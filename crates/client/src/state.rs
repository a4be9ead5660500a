//! Explicit proxy state shared by every request and background job.
//!
//! The host builds one [`ProxyState`] at start-up and calls
//! [`ProxyState::dispatch`] for every outbound request. There is no ambient
//! global: version tags, the store handle, and the origin all live here.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use edgecache_core::{AppConfig, CacheDb, CacheEntry, Error, RequestKey, VersionTags};
use tokio_util::task::TaskTracker;
use url::Url;

use crate::fetch::canonicalize;
use crate::origin::Origin;
use crate::request::RequestDescriptor;
use crate::response::{OriginResponse, ProxyResponse};
use crate::router;
use crate::strategy::Strategy;

/// Options that shape a [`ProxyState`], usually derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct ProxyOptions {
    pub tags: VersionTags,
    /// Upper bound on every origin fetch made through the proxy.
    pub fetch_timeout: Duration,
    /// Base for root-relative URLs.
    pub origin_base: Option<Url>,
}

impl ProxyOptions {
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin_base = config
            .origin_base
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self { tags: config.version_tags(), fetch_timeout: config.timeout(), origin_base })
    }
}

struct Inner {
    db: CacheDb,
    origin: Arc<dyn Origin>,
    options: ProxyOptions,
    refreshes: TaskTracker,
    settling: tokio::sync::Mutex<()>,
}

/// Handle to the proxy. Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct ProxyState {
    inner: Arc<Inner>,
}

impl ProxyState {
    pub fn new(db: CacheDb, origin: Arc<dyn Origin>, options: ProxyOptions) -> Self {
        let inner = Inner { db, origin, options, refreshes: TaskTracker::new(), settling: tokio::sync::Mutex::new(()) };
        Self { inner: Arc::new(inner) }
    }

    pub fn db(&self) -> &CacheDb {
        &self.inner.db
    }

    pub fn tags(&self) -> &VersionTags {
        &self.inner.options.tags
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.inner.options.fetch_timeout
    }

    pub fn static_namespace(&self) -> String {
        self.tags().static_namespace()
    }

    pub fn dynamic_namespace(&self) -> String {
        self.tags().dynamic_namespace()
    }

    /// Canonicalize a URL, resolving root-relative input against the origin base.
    pub fn resolve_url(&self, input: &str) -> Result<Url, Error> {
        canonicalize(input, self.inner.options.origin_base.as_ref()).map_err(|e| Error::InvalidUrl(e.to_string()))
    }

    /// Build a request descriptor from host-supplied parts.
    pub fn describe<I, K, V>(&self, method: &str, url: &str, headers: I) -> Result<RequestDescriptor, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        if method.trim().is_empty() {
            return Err(Error::InvalidInput("method cannot be empty".into()));
        }
        Ok(RequestDescriptor::new(method, self.resolve_url(url)?).with_headers(headers))
    }

    /// Entry point for every outbound request.
    ///
    /// Non-interceptable requests go straight to origin without touching the
    /// cache; everything else is classified and handed to its strategy.
    pub async fn dispatch(&self, req: &RequestDescriptor) -> Result<ProxyResponse, Error> {
        if !router::is_interceptable(req) {
            tracing::debug!(method = %req.method, url = %req.url, "pass-through");
            let response = self.fetch_origin(req).await?;
            return Ok(ProxyResponse::from_origin(response, None));
        }

        let strategy = router::classify(req);
        tracing::debug!(url = %req.url, %strategy, "dispatch");
        strategy.execute(self, req).await
    }

    /// Fetch from origin, bounded by the configured timeout regardless of the
    /// origin implementation.
    pub async fn fetch_origin(&self, req: &RequestDescriptor) -> Result<OriginResponse, Error> {
        let timeout = self.fetch_timeout();
        match tokio::time::timeout(timeout, self.inner.origin.fetch(req)).await {
            Ok(result) => result,
            Err(_) => Err(Error::FetchTimeout(format!("{} after {}ms", req.url, timeout.as_millis()))),
        }
    }

    /// Cache read used by strategies.
    ///
    /// A missing namespace is an empty cache. Other store errors are logged and
    /// also treated as a miss so the request can still be answered.
    pub async fn lookup(&self, namespace: &str, key: &RequestKey) -> Option<CacheEntry> {
        match self.inner.db.match_entry(namespace, key).await {
            Ok(entry) => entry,
            Err(Error::NamespaceNotFound(_)) => None,
            Err(e) => {
                tracing::warn!(namespace, key = %key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Write-through of an origin response. Non-2xx responses are skipped.
    ///
    /// Returns true if the entry was stored.
    pub async fn store(&self, namespace: &str, key: &RequestKey, response: &OriginResponse) -> bool {
        if !response.is_success() {
            tracing::debug!(namespace, key = %key, status = response.status, "not caching non-success response");
            return false;
        }

        let entry = CacheEntry::capture(
            key.clone(),
            response.status,
            response.headers.clone(),
            response.body.to_vec(),
            Utc::now(),
        );
        match self.inner.db.put_entry(namespace, &entry).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(namespace, key = %key, error = %e, "cache write failed");
                false
            }
        }
    }

    /// Spawn a background cache refresh that outlives the calling request.
    pub(crate) fn spawn_refresh(
        &self, strategy: Strategy, req: RequestDescriptor,
    ) -> tokio::task::JoinHandle<Result<OriginResponse, Error>> {
        let state = self.clone();
        self.inner.refreshes.spawn(async move {
            let namespace = state.dynamic_namespace();
            let key = req.key();
            match state.fetch_origin(&req).await {
                Ok(response) => {
                    state.store(&namespace, &key, &response).await;
                    Ok(response)
                }
                Err(e) => {
                    tracing::debug!(%strategy, key = %key, error = %e, "background refresh failed");
                    Err(e)
                }
            }
        })
    }

    /// Wait for every background refresh spawned so far to finish.
    ///
    /// Concurrent callers are serialised so one caller's reopen cannot leave
    /// another waiting on an open tracker.
    pub async fn settle_refreshes(&self) {
        let _settling = self.inner.settling.lock().await;
        let tracker = &self.inner.refreshes;
        tracker.close();
        tracker.wait().await;
        tracker.reopen();
    }
}

impl std::fmt::Debug for ProxyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyState")
            .field("tags", self.tags())
            .field("fetch_timeout", &self.fetch_timeout())
            .finish_non_exhaustive()
    }
}
