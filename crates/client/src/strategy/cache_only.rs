//! Answer from cache or not at all. The network is never consulted.

use edgecache_core::Error;

use super::Strategy;
use crate::request::RequestDescriptor;
use crate::response::ProxyResponse;
use crate::state::ProxyState;

pub(super) async fn handle(state: &ProxyState, req: &RequestDescriptor) -> Result<ProxyResponse, Error> {
    let key = req.key();
    for namespace in [state.dynamic_namespace(), state.static_namespace()] {
        if let Some(entry) = state.lookup(&namespace, &key).await {
            return Ok(ProxyResponse::from_entry(entry, Strategy::CacheOnly));
        }
    }
    Ok(ProxyResponse::not_cached(Strategy::CacheOnly))
}

#[cfg(test)]
mod tests {
    use crate::response::ResponseSource;
    use crate::strategy::Strategy;
    use crate::testing::{FakeOrigin, get, proxy};

    #[tokio::test]
    async fn test_miss_is_404_without_network() {
        let url = "https://app.example.com/never-written";
        let (state, origin) = proxy(FakeOrigin::new().respond(url, 200, "live")).await;

        let response = Strategy::CacheOnly.execute(&state, &get(url)).await.unwrap();
        assert_eq!(response.status, 404);
        assert!(response.is_sentinel());
        assert_eq!(origin.calls(), 0);
    }

    #[tokio::test]
    async fn test_reads_static_when_dynamic_misses() {
        let url = "https://app.example.com/app.css";
        let (state, origin) = proxy(FakeOrigin::new().respond(url, 200, "body{}")).await;
        Strategy::CacheFirst.execute(&state, &get(url)).await.unwrap();

        let response = Strategy::CacheOnly.execute(&state, &get(url)).await.unwrap();
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(response.body.as_ref(), b"body{}");
        assert_eq!(origin.calls(), 1);
    }

    #[tokio::test]
    async fn test_network_first_result_is_replayed_without_network() {
        let url = "https://app.example.com/api/items";
        let (state, origin) = proxy(FakeOrigin::new().respond(url, 200, "[1,2]")).await;
        Strategy::NetworkFirst.execute(&state, &get(url)).await.unwrap();

        let response = Strategy::CacheOnly.execute(&state, &get(url)).await.unwrap();
        assert_eq!(response.body.as_ref(), b"[1,2]");
        assert_eq!(origin.calls(), 1);
    }
}
