//! Pulling the provider's popular list into a catalog.

use crate::error::Result;
use crate::fetcher::MetadataFetcher;
use crate::tmdb::TmdbClient;
use catalog::{Catalog, Item, Upsert};
use tracing::{info, instrument, warn};

/// Counts from one [`sync_popular`] run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub page: u32,
    pub fetched: usize,
    pub added: usize,
    pub updated: usize,
}

/// Fetch one page of popular items and merge it into `catalog`.
///
/// The popular list has no genre names, so each entry the catalog cannot
/// already describe is looked up in detail first. A failed detail lookup is
/// logged and the list entry is stored as is. Metadata already in the
/// catalog is never overwritten.
#[instrument(skip(client, catalog))]
pub async fn sync_popular(
    client: &TmdbClient,
    catalog: &mut Catalog,
    page: u32,
) -> Result<SyncSummary> {
    let listed = client.fetch_popular(page).await?;
    let mut summary = SyncSummary {
        page,
        fetched: listed.len(),
        ..Default::default()
    };

    for mut item in listed {
        if catalog.get_item(&item.id).is_some_and(Item::is_enriched) {
            continue;
        }

        match client.fetch(&item.id).await {
            Ok(details) => {
                item.fill_gaps(details);
            }
            Err(e) => warn!("Details for {} unavailable, keeping list entry: {}", item.id, e),
        }

        match catalog.upsert_item(item) {
            Upsert::Inserted => summary.added += 1,
            Upsert::Updated => summary.updated += 1,
            Upsert::Unchanged => {}
        }
    }

    info!(
        "Synced popular page {}: {} listed, {} added, {} updated",
        page, summary.fetched, summary.added, summary.updated
    );
    Ok(summary)
}
