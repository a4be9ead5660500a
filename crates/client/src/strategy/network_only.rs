//! Straight to origin. Nothing is read from or written to cache.

use edgecache_core::Error;

use super::Strategy;
use crate::request::RequestDescriptor;
use crate::response::ProxyResponse;
use crate::state::ProxyState;

pub(super) async fn handle(state: &ProxyState, req: &RequestDescriptor) -> Result<ProxyResponse, Error> {
    let response = state.fetch_origin(req).await?;
    Ok(ProxyResponse::from_origin(response, Some(Strategy::NetworkOnly)))
}
