//! Serve from the static namespace; fall back to origin and write through.

use edgecache_core::Error;

use super::Strategy;
use crate::request::RequestDescriptor;
use crate::response::ProxyResponse;
use crate::state::ProxyState;

pub(super) async fn handle(state: &ProxyState, req: &RequestDescriptor) -> Result<ProxyResponse, Error> {
    let namespace = state.static_namespace();
    let key = req.key();

    if let Some(entry) = state.lookup(&namespace, &key).await {
        tracing::trace!(key = %key, "cache_first hit");
        return Ok(ProxyResponse::from_entry(entry, Strategy::CacheFirst));
    }

    match state.fetch_origin(req).await {
        Ok(response) => {
            state.store(&namespace, &key, &response).await;
            Ok(ProxyResponse::from_origin(response, Some(Strategy::CacheFirst)))
        }
        Err(e) => {
            tracing::info!(key = %key, error = %e, "cache_first miss with origin unavailable");
            Ok(ProxyResponse::offline(Strategy::CacheFirst))
        }
    }
}
