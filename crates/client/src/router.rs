//! Strategy selection from URL, host, and header heuristics.
//!
//! Rules are checked in order and the first match wins; the categories
//! overlap (a tracking pixel is also a `.gif`), so the order is significant:
//!
//! 1. Analytics/tracking host or path → `NetworkOnly`
//! 2. `Cache-Control: only-if-cached` → `CacheOnly`
//! 3. API path or JSON `Accept` → `NetworkFirst`
//! 4. Static asset extension, font host, or script CDN → `CacheFirst`
//! 5. Anything else (pages) → `StaleWhileRevalidate`

use std::sync::LazyLock;

use regex::Regex;

use crate::request::RequestDescriptor;
use crate::strategy::Strategy;

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("router pattern is a valid regex")
}

static ANALYTICS_HOST: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?i)(^|\.)(google-analytics\.com|googletagmanager\.com|doubleclick\.net|plausible\.io|segment\.(io|com)|hotjar\.com|mixpanel\.com|clarity\.ms)$|^(analytics|stats|telemetry|metrics)\.",
    )
});

// `pixel` only as a directory, a bare endpoint, or a .gif beacon; other pixel images are ordinary assets.
static ANALYTICS_PATH: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)/(analytics|collect|track|tracking|beacon|telemetry)(/|\.|$)|/pixel(/|\.gif$|$)")
});

static API_PATH: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)(/(api|graphql)(/|$))|\.json$"));

static STATIC_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)\.(css|js|mjs|png|jpe?g|gif|svg|webp|avif|ico|woff2?|ttf|otf|eot)$"));

static STATIC_HOST: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?i)^(fonts\.googleapis\.com|fonts\.gstatic\.com|use\.typekit\.net|cdnjs\.cloudflare\.com|cdn\.jsdelivr\.net|unpkg\.com|ajax\.googleapis\.com)$",
    )
});

/// Only plain `GET`s over http(s) are intercepted. Everything else bypasses
/// the proxy: forwarded untouched, never read from or written to cache.
pub fn is_interceptable(req: &RequestDescriptor) -> bool {
    req.method == "GET" && matches!(req.url.scheme(), "http" | "https")
}

fn is_tracking(req: &RequestDescriptor) -> bool {
    ANALYTICS_HOST.is_match(req.host()) || ANALYTICS_PATH.is_match(req.path())
}

fn wants_cached_only(req: &RequestDescriptor) -> bool {
    req.header("cache-control")
        .is_some_and(|v| v.split(',').any(|d| d.trim().eq_ignore_ascii_case("only-if-cached")))
}

fn is_api(req: &RequestDescriptor) -> bool {
    if API_PATH.is_match(req.path()) {
        return true;
    }
    req.header("accept").is_some_and(|accept| {
        let accept = accept.to_ascii_lowercase();
        !accept.contains("text/html") && (accept.contains("application/json") || accept.contains("+json"))
    })
}

fn is_static_asset(req: &RequestDescriptor) -> bool {
    STATIC_EXTENSION.is_match(req.path()) || STATIC_HOST.is_match(req.host())
}

/// Pick the strategy for a request. Pure and total.
pub fn classify(req: &RequestDescriptor) -> Strategy {
    if is_tracking(req) {
        Strategy::NetworkOnly
    } else if wants_cached_only(req) {
        Strategy::CacheOnly
    } else if is_api(req) {
        Strategy::NetworkFirst
    } else if is_static_asset(req) {
        Strategy::CacheFirst
    } else {
        Strategy::StaleWhileRevalidate
    }
}
