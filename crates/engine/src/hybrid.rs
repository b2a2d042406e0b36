//! # Hybrid Engine
//!
//! Coordinates the two predictors:
//! 1. Train collaborative on (users, items, ratings), then content on items
//! 2. Commit the shared catalog snapshot once both succeeded
//! 3. At inference, query both predictors concurrently
//! 4. Merge first-source-wins and truncate to top N
//! 5. Resolve identifiers to items, optionally enriching from a metadata provider
//!
//! Item-to-item lookups (`similar_items`) go to the content predictor alone.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use catalog::{Catalog, Item, ItemId, Rating, User};
use metadata::{MetadataError, MetadataFetcher};
use models::{CandidateSource, CollaborativeModel, ContentModel, RankedCandidate, rank_candidates};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::merge::{merge_candidates, merge_recommendations};

const ENGINE_NAME: &str = "hybrid-engine";

/// Hybrid recommender over one collaborative and one content predictor.
///
/// The engine does not know whether the predictors run in-process or behind
/// the model-serving boundary.
pub struct HybridEngine {
    collaborative: Arc<dyn CollaborativeModel>,
    content: Arc<dyn ContentModel>,
    metadata: Option<Arc<dyn MetadataFetcher>>,
    config: EngineConfig,
    catalog: RwLock<Option<Arc<Catalog>>>,
}

impl HybridEngine {
    pub fn new(collaborative: Arc<dyn CollaborativeModel>, content: Arc<dyn ContentModel>) -> Self {
        Self {
            collaborative,
            content,
            metadata: None,
            config: EngineConfig::default(),
            catalog: RwLock::new(None),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Install the provider used by `recommend_enriched`
    pub fn with_metadata_fetcher(mut self, fetcher: Arc<dyn MetadataFetcher>) -> Self {
        self.metadata = Some(fetcher);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// True once a `train` call has completed successfully
    pub fn is_trained(&self) -> bool {
        self.catalog.read().is_some()
    }

    fn snapshot(&self) -> Result<Arc<Catalog>> {
        self.catalog.read().clone().ok_or_else(|| EngineError::UntrainedModel {
            model: ENGINE_NAME.to_string(),
        })
    }

    // ========================================================================
    // Training
    // ========================================================================

    /// Train both predictors on the same dataset view.
    ///
    /// Collaborative trains first; if it fails, content training is not
    /// attempted. If content training fails, the collaborative model keeps
    /// whatever state it just learned. The catalog snapshot used for item
    /// resolution is only replaced after both succeed.
    pub async fn train(&self, users: &[User], items: &[Item], ratings: &[Rating]) -> Result<()> {
        let start_time = Instant::now();
        info!(
            "Training on {} users, {} items, {} ratings",
            users.len(),
            items.len(),
            ratings.len()
        );

        self.collaborative.train(users, items, ratings).await?;
        info!(
            "Trained {} in {:.2?}",
            self.collaborative.name(),
            start_time.elapsed()
        );

        let content_start = Instant::now();
        self.content.train(items).await?;
        info!(
            "Trained {} in {:.2?}",
            self.content.name(),
            content_start.elapsed()
        );

        let catalog = Catalog::from_parts(users.to_vec(), items.to_vec(), ratings.to_vec());
        *self.catalog.write() = Some(Arc::new(catalog));

        info!("Training complete in {:.2?}", start_time.elapsed());
        Ok(())
    }

    /// Train on an already loaded catalog
    pub async fn train_from_catalog(&self, catalog: &Catalog) -> Result<()> {
        self.train(catalog.users(), catalog.items(), catalog.ratings()).await
    }

    // ========================================================================
    // Inference
    // ========================================================================

    /// Query both predictors; collaborative output is cut to the configured limit
    async fn predict_both(
        &self,
        catalog: &Catalog,
        user: &User,
        top_n: usize,
    ) -> Result<(Vec<ItemId>, Vec<ItemId>)> {
        let candidates = catalog.all_item_ids();

        // Concurrent; either failure fails the whole request
        let (mut collaborative, content) = tokio::try_join!(
            self.collaborative.predict(user, &candidates),
            self.content.predict(&user.viewing_history, &candidates, top_n),
        )?;

        collaborative.truncate(self.config.collaborative_limit);
        debug!(
            "Got {} collaborative and {} content candidates",
            collaborative.len(),
            content.len()
        );
        Ok((collaborative, content))
    }

    async fn merged_ids(&self, catalog: &Catalog, user: &User, top_n: usize) -> Result<Vec<ItemId>> {
        if top_n == 0 {
            return Ok(Vec::new());
        }

        let (collaborative, content) = self.predict_both(catalog, user, top_n).await?;
        Ok(merge_recommendations(&collaborative, &content, signed(top_n)))
    }

    /// Merged best-first item identifiers, before catalog resolution
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn recommend_ids(&self, user: &User, top_n: usize) -> Result<Vec<ItemId>> {
        let catalog = self.snapshot()?;
        self.merged_ids(&catalog, user, top_n).await
    }

    /// Like `recommend_ids`, tagging each entry with the predictor it came from
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn recommend_candidates(
        &self,
        user: &User,
        top_n: usize,
    ) -> Result<Vec<RankedCandidate>> {
        let catalog = self.snapshot()?;
        if top_n == 0 {
            return Ok(Vec::new());
        }

        let (collaborative, content) = self.predict_both(&catalog, user, top_n).await?;
        Ok(merge_candidates(
            rank_candidates(collaborative, CandidateSource::Collaborative),
            rank_candidates(content, CandidateSource::Content),
            signed(top_n),
        ))
    }

    /// Top-N items for `user`, best first.
    ///
    /// Identifiers the catalog does not know are skipped, so the result may
    /// be shorter than `top_n`. Never touches the network beyond the
    /// predictors themselves.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn recommend(&self, user: &User, top_n: usize) -> Result<Vec<Item>> {
        let start_time = Instant::now();
        let catalog = self.snapshot()?;
        let item_ids = self.merged_ids(&catalog, user, top_n).await?;
        let items = resolve(&catalog, &item_ids);

        info!(
            "Recommended {} items for user {} in {:.2?}",
            items.len(),
            user.id,
            start_time.elapsed()
        );
        Ok(items)
    }

    /// Items most like `item_id` by content features, best first.
    ///
    /// `item_id` is sent to the content predictor as a one-item history, and
    /// is never part of the result. Fails with [`EngineError::UnknownItem`]
    /// when the catalog does not know it.
    #[instrument(skip(self))]
    pub async fn similar_items(&self, item_id: &str, top_n: usize) -> Result<Vec<Item>> {
        let catalog = self.snapshot()?;
        if catalog.get_item(item_id).is_none() {
            return Err(EngineError::UnknownItem {
                item_id: item_id.to_string(),
            });
        }
        if top_n == 0 {
            return Ok(Vec::new());
        }

        let history = [item_id.to_string()];
        let mut similar = self
            .content
            .predict(&history, &catalog.all_item_ids(), top_n.saturating_add(1))
            .await?;
        similar.retain(|id| id != item_id);
        similar.truncate(top_n);

        debug!("Found {} items similar to {}", similar.len(), item_id);
        Ok(resolve(&catalog, &similar))
    }

    /// `recommend` with the configured default size
    pub async fn recommend_default(&self, user: &User) -> Result<Vec<Item>> {
        self.recommend(user, self.config.default_top_n).await
    }

    /// Fetch metadata for one item from the configured provider
    pub async fn enrich_item(&self, item_id: &str) -> Result<Item> {
        let fetcher = self
            .metadata
            .as_ref()
            .ok_or(EngineError::Metadata(MetadataError::MissingCredential))?;
        Ok(fetcher.fetch(item_id).await?)
    }

    /// Like `recommend`, but fills in items the catalog cannot describe.
    ///
    /// Identifiers missing from the catalog, and catalog items without a
    /// name, are looked up through the metadata provider. A failed lookup is
    /// logged; the catalog record is used instead, or the item is skipped
    /// when there is none. Enrichment never fails the request.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn recommend_enriched(&self, user: &User, top_n: usize) -> Result<Vec<Item>> {
        let catalog = self.snapshot()?;
        let item_ids = self.merged_ids(&catalog, user, top_n).await?;

        if self.metadata.is_none() {
            debug!("No metadata provider configured, resolving from catalog only");
        }

        let mut items = Vec::with_capacity(item_ids.len());
        for item_id in &item_ids {
            let known = catalog.get_item(item_id);
            if known.is_some_and(|item| item.name.is_some()) || self.metadata.is_none() {
                match known {
                    Some(item) => items.push(item.clone()),
                    None => warn!("Skipping unknown item {}", item_id),
                }
                continue;
            }

            match self.enrich_item(item_id).await {
                Ok(fetched) => items.push(combine(known, fetched, item_id)),
                Err(e) => match known {
                    Some(item) => {
                        warn!("Enrichment failed for {}, using catalog record: {}", item_id, e);
                        items.push(item.clone());
                    }
                    None => warn!("Enrichment failed for unknown item {}, skipping: {}", item_id, e),
                },
            }
        }

        Ok(items)
    }
}

fn signed(top_n: usize) -> i64 {
    i64::try_from(top_n).unwrap_or(i64::MAX)
}

/// Look up each identifier, skipping the ones the catalog does not know
fn resolve(catalog: &Catalog, item_ids: &[ItemId]) -> Vec<Item> {
    item_ids
        .iter()
        .filter_map(|item_id| {
            let item = catalog.get_item(item_id);
            if item.is_none() {
                warn!("Skipping unknown item {}", item_id);
            }
            item.cloned()
        })
        .collect()
}

/// Fill the gaps in a catalog record with fetched metadata
fn combine(known: Option<&Item>, fetched: Item, item_id: &ItemId) -> Item {
    match known {
        Some(existing) => {
            let mut item = existing.clone();
            item.fill_gaps(fetched);
            item
        }
        None => Item {
            id: item_id.clone(),
            ..fetched
        },
    }
}
