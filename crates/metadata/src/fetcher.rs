use crate::error::Result;
use async_trait::async_trait;
use catalog::Item;

/// Resolves an item identifier to a described item from an external provider.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, item_id: &str) -> Result<Item>;
}
