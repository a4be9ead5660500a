//! The network seam between strategies and origin.

use async_trait::async_trait;
use edgecache_core::Error;

use crate::request::RequestDescriptor;
use crate::response::OriginResponse;

/// Something that can answer a request from the network.
///
/// Implementations return non-2xx responses as `Ok`; `Err` means the origin
/// could not be reached or the response could not be read.
#[async_trait]
pub trait Origin: Send + Sync {
    async fn fetch(&self, req: &RequestDescriptor) -> Result<OriginResponse, Error>;
}
