//! HTTP fetch pipeline towards origin.
//!
//! ### URL Canonicalization
//! - Trim whitespace, resolve root-relative URLs against the origin base
//! - Lowercase host, remove fragments
//! - Preserve query string
//!
//! ### Limits
//! - Request timeout (default 10s), enforced by reqwest
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//!
//! Non-2xx responses are returned as-is; deciding whether they may be cached
//! is the caller's job.

pub mod url;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method, header};

pub use self::url::{UrlError, canonicalize};

use crate::origin::Origin;
use crate::request::RequestDescriptor;
use crate::response::OriginResponse;
use edgecache_core::{AppConfig, Error};

/// Request headers never forwarded to origin.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "edgecache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 10s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "edgecache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(10_000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// Convert a reqwest header map into lowercased name/value pairs.
///
/// Values that are not valid UTF-8 are dropped; repeated headers are joined.
pub(crate) fn flatten_headers(headers: &header::HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else { continue };
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    out
}

pub(crate) fn map_reqwest_error(err: &reqwest::Error) -> Error {
    if err.is_timeout() { Error::FetchTimeout(err.to_string()) } else { Error::Network(err.to_string()) }
}

/// reqwest-backed origin client.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Origin for FetchClient {
    async fn fetch(&self, req: &RequestDescriptor) -> Result<OriginResponse, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(req.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {}", req.method, e)))?;

        let mut request = self.http.request(method, req.url.clone());
        for (name, value) in &req.headers {
            if HOP_BY_HOP.contains(&name.as_str()) {
                continue;
            }
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| map_reqwest_error(&e))?;

        let status = response.status().as_u16();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let headers = flatten_headers(response.headers());

        let body = response.bytes().await.map_err(|e| map_reqwest_error(&e))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            method = %req.method,
            url = %req.url,
            status,
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "origin fetch complete"
        );

        Ok(OriginResponse { final_url, status, headers, body })
    }
}
