//! Request identity used to address cache entries.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

use crate::Error;

/// Canonical identity of a cacheable request: method plus normalized URL.
///
/// Request headers are not part of the key. Two requests for the same URL
/// with different `Accept` or `Accept-Language` headers share one entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequestKey {
    method: String,
    url: String,
}

impl RequestKey {
    /// Build a key from a method and an already-canonicalized URL.
    ///
    /// The method is uppercased and any fragment is dropped; the query string
    /// is kept verbatim.
    pub fn new(method: &str, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self { method: method.trim().to_ascii_uppercase(), url: url.to_string() }
    }

    /// Shorthand for a `GET` key.
    pub fn get(url: &Url) -> Self {
        Self::new("GET", url)
    }

    /// Parse the `"{METHOD} {url}"` form produced by `Display`.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let (method, url) = s
            .split_once(' ')
            .ok_or_else(|| Error::InvalidInput(format!("malformed request key: {s}")))?;
        let url = Url::parse(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self::new(method, &url))
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// SHA-256 of the key text, hex-encoded. Row identity within a namespace.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.url.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

impl TryFrom<String> for RequestKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RequestKey> for String {
    fn from(key: RequestKey) -> Self {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_digest_stability() {
        let a = RequestKey::get(&url("https://example.com/app.css"));
        let b = RequestKey::get(&url("https://example.com/app.css"));
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a, b);
    }

    #[test]
    fn test_digest_format() {
        let key = RequestKey::get(&url("https://example.com"));
        let digest = key.digest();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_method_is_part_of_key() {
        let get = RequestKey::new("get", &url("https://example.com/a"));
        let head = RequestKey::new("HEAD", &url("https://example.com/a"));
        assert_eq!(get.method(), "GET");
        assert_ne!(get.digest(), head.digest());
    }

    #[test]
    fn test_query_kept_fragment_dropped() {
        let with_fragment = RequestKey::get(&url("https://example.com/a?b=2&a=1#top"));
        assert_eq!(with_fragment.url(), "https://example.com/a?b=2&a=1");

        let other_query = RequestKey::get(&url("https://example.com/a?a=1&b=2"));
        assert_ne!(with_fragment, other_query);
    }

    #[test]
    fn test_display_parse() {
        let key = RequestKey::get(&url("https://example.com/data.json?page=2"));
        let text = key.to_string();
        assert_eq!(text, "GET https://example.com/data.json?page=2");
        assert_eq!(RequestKey::parse(&text).unwrap(), key);
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(RequestKey::parse("nospace"), Err(Error::InvalidInput(_))));
        assert!(matches!(RequestKey::parse("GET not a url"), Err(Error::InvalidUrl(_))));
    }
}
