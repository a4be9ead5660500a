//! Per-request read/fetch/write algorithms.
//!
//! | Strategy | Read | Network success | Network failure |
//! |---|---|---|---|
//! | CacheFirst | static namespace | write-through to static | 503 sentinel |
//! | NetworkFirst | none | write-through to dynamic | cached entry, else 503 |
//! | CacheOnly | dynamic, then static | never fetches | 404 sentinel on miss |
//! | NetworkOnly | none | passed through, never cached | error surfaced |
//! | StaleWhileRevalidate | dynamic, answers at once | background write-through | ignored if cache answered, else 503 |

mod cache_first;
mod cache_only;
mod network_first;
mod network_only;
mod stale_while_revalidate;

use std::fmt;

use edgecache_core::Error;
use serde::{Deserialize, Serialize};

use crate::request::RequestDescriptor;
use crate::response::ProxyResponse;
use crate::state::ProxyState;

/// Which algorithm answers a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    CacheOnly,
    NetworkOnly,
    StaleWhileRevalidate,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::CacheFirst => "cache_first",
            Strategy::NetworkFirst => "network_first",
            Strategy::CacheOnly => "cache_only",
            Strategy::NetworkOnly => "network_only",
            Strategy::StaleWhileRevalidate => "stale_while_revalidate",
        }
    }

    /// Run this strategy for `req`.
    ///
    /// Only `NetworkOnly` returns network errors; every other strategy turns an
    /// exhausted fallback into a sentinel response.
    pub async fn execute(self, state: &ProxyState, req: &RequestDescriptor) -> Result<ProxyResponse, Error> {
        match self {
            Strategy::CacheFirst => cache_first::handle(state, req).await,
            Strategy::NetworkFirst => network_first::handle(state, req).await,
            Strategy::CacheOnly => cache_only::handle(state, req).await,
            Strategy::NetworkOnly => network_only::handle(state, req).await,
            Strategy::StaleWhileRevalidate => stale_while_revalidate::handle(state, req).await,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
