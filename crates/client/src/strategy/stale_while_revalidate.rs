//! Answer from the dynamic namespace at once while refreshing in background.
//!
//! The refresh is spawned before the cache is consulted, so the cached answer
//! and the refresh race independently. When the cache answers, the refresh's
//! outcome is dropped from the caller's view but still updates the cache.

use edgecache_core::Error;

use super::Strategy;
use crate::request::RequestDescriptor;
use crate::response::ProxyResponse;
use crate::state::ProxyState;

pub(super) async fn handle(state: &ProxyState, req: &RequestDescriptor) -> Result<ProxyResponse, Error> {
    let refresh = state.spawn_refresh(Strategy::StaleWhileRevalidate, req.clone());

    if let Some(entry) = state.lookup(&state.dynamic_namespace(), &req.key()).await {
        return Ok(ProxyResponse::from_entry(entry, Strategy::StaleWhileRevalidate));
    }

    match refresh.await {
        Ok(Ok(response)) => Ok(ProxyResponse::from_origin(response, Some(Strategy::StaleWhileRevalidate))),
        Ok(Err(_)) => Ok(ProxyResponse::offline(Strategy::StaleWhileRevalidate)),
        Err(join_err) => {
            tracing::error!(url = %req.url, error = %join_err, "revalidation task failed");
            Ok(ProxyResponse::offline(Strategy::StaleWhileRevalidate))
        }
    }
}
