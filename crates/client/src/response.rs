//! Responses produced by the origin and by the proxy.

use std::collections::BTreeMap;

use bytes::Bytes;
use edgecache_core::CacheEntry;
use url::Url;

use crate::strategy::Strategy;

/// Header marking a synthesized response.
pub const SENTINEL_HEADER: &str = "x-edgecache-sentinel";

/// Raw response from origin, before any caching decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginResponse {
    /// The final URL after redirects
    pub final_url: Url,
    pub status: u16,
    /// Lowercased header names; repeated headers joined with ", "
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl OriginResponse {
    /// 2xx. Only these are ever written to cache.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Where a proxy response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// Served from a cache namespace
    Cache,
    /// Fresh from origin
    Network,
    /// Synthesized because neither cache nor network could answer
    Sentinel,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Network => "network",
            ResponseSource::Sentinel => "sentinel",
        }
    }
}

/// What the proxy hands back to its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
    pub source: ResponseSource,
    /// Strategy that produced the response; `None` for pass-through requests.
    pub strategy: Option<Strategy>,
}

impl ProxyResponse {
    pub fn from_origin(response: OriginResponse, strategy: Option<Strategy>) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
            source: ResponseSource::Network,
            strategy,
        }
    }

    pub fn from_entry(entry: CacheEntry, strategy: Strategy) -> Self {
        Self {
            status: entry.status,
            headers: entry.headers,
            body: Bytes::from(entry.body),
            source: ResponseSource::Cache,
            strategy: Some(strategy),
        }
    }

    /// 503 returned when the network failed and nothing was cached.
    pub fn offline(strategy: Strategy) -> Self {
        Self::sentinel(503, "offline", "Service Unavailable", strategy)
    }

    /// 404 returned by cache-only lookups that miss.
    pub fn not_cached(strategy: Strategy) -> Self {
        Self::sentinel(404, "not-cached", "Not Found", strategy)
    }

    fn sentinel(status: u16, kind: &str, text: &'static str, strategy: Strategy) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "text/plain; charset=utf-8".to_string());
        headers.insert(SENTINEL_HEADER.to_string(), kind.to_string());
        Self {
            status,
            headers,
            body: Bytes::from_static(text.as_bytes()),
            source: ResponseSource::Sentinel,
            strategy: Some(strategy),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.source == ResponseSource::Sentinel
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}
