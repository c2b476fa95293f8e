//! Data-source collaborator contract

use async_trait::async_trait;
use yensense_core::RawData;

/// Market data gateway consumed by the data-collection stage
///
/// `fetch_all` never fails. Implementations substitute documented fallback
/// values for anything they cannot fetch; a category left `None` means the
/// source has nothing at all for it.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_all(&self) -> RawData;
}
