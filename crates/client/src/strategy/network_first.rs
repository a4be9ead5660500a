//! Prefer origin; write through to the dynamic namespace; fall back to cache.

use edgecache_core::Error;

use super::Strategy;
use crate::request::RequestDescriptor;
use crate::response::ProxyResponse;
use crate::state::ProxyState;

pub(super) async fn handle(state: &ProxyState, req: &RequestDescriptor) -> Result<ProxyResponse, Error> {
    let namespace = state.dynamic_namespace();
    let key = req.key();

    match state.fetch_origin(req).await {
        Ok(response) => {
            state.store(&namespace, &key, &response).await;
            Ok(ProxyResponse::from_origin(response, Some(Strategy::NetworkFirst)))
        }
        Err(e) => {
            tracing::info!(key = %key, error = %e, "network_first falling back to cache");
            if let Some(entry) = state.lookup(&namespace, &key).await {
                return Ok(ProxyResponse::from_entry(entry, Strategy::NetworkFirst));
            }
            if let Some(entry) = state.lookup(&state.static_namespace(), &key).await {
                return Ok(ProxyResponse::from_entry(entry, Strategy::NetworkFirst));
            }
            Ok(ProxyResponse::offline(Strategy::NetworkFirst))
        }
    }
}
