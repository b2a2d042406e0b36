//! Genre TF-IDF - Native Content-Based Filtering
//!
//! Treats each item's genre labels as a tiny document and recommends items
//! whose genre vector points the same way as the user's viewing history.
//!
//! ## Algorithm
//! 1. Train: per-genre smoothed IDF, then an L2-normalised TF-IDF vector per item
//! 2. Predict: sum the vectors of the history items (repeat views count twice)
//! 3. Score each unseen candidate by cosine similarity with that profile
//! 4. Drop zero-similarity items, sort best first, keep `top_n`

use crate::traits::{ContentModel, ModelError, ModelResult};
use async_trait::async_trait;
use catalog::{Item, ItemId};
use parking_lot::RwLock;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument};

const MODEL_NAME: &str = "genre-tfidf";

/// Sparse genre -> weight vector
type SparseVector = HashMap<String, f32>;

#[derive(Debug, Default)]
struct TfIdfIndex {
    vectors: HashMap<ItemId, SparseVector>,
}

fn normalize(vector: &mut SparseVector) {
    let norm = vector.values().map(|w| w * w).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.values_mut().for_each(|w| *w /= norm);
    }
}

fn dot(a: &SparseVector, b: &SparseVector) -> f32 {
    // Iterate the smaller map
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(genre, w)| large.get(genre).map(|v| w * v))
        .sum()
}

fn build_index(items: &[Item]) -> TfIdfIndex {
    let n = items.len() as f32;

    let mut document_frequency: HashMap<String, u32> = HashMap::new();
    for item in items {
        let genres: HashSet<String> = item.genres.iter().map(|g| g.to_lowercase()).collect();
        for genre in genres {
            *document_frequency.entry(genre).or_insert(0) += 1;
        }
    }

    let idf: HashMap<String, f32> = document_frequency
        .into_iter()
        .map(|(genre, df)| (genre, ((1.0 + n) / (1.0 + df as f32)).ln() + 1.0))
        .collect();

    let vectors = items
        .iter()
        .map(|item| {
            let mut vector: SparseVector = item
                .genres
                .iter()
                .map(|g| g.to_lowercase())
                .filter_map(|g| idf.get(&g).map(|&w| (g, w)))
                .collect();
            normalize(&mut vector);
            (item.id.clone(), vector)
        })
        .collect();

    TfIdfIndex { vectors }
}

/// In-process content predictor over item genres
pub struct GenreTfIdfModel {
    state: RwLock<Option<Arc<TfIdfIndex>>>,
}

impl GenreTfIdfModel {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(None),
        }
    }

    pub fn is_trained(&self) -> bool {
        self.state.read().is_some()
    }
}

impl Default for GenreTfIdfModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentModel for GenreTfIdfModel {
    fn name(&self) -> &str {
        MODEL_NAME
    }

    #[instrument(skip_all, fields(items = items.len()))]
    async fn train(&self, items: &[Item]) -> ModelResult<()> {
        let index = build_index(items);
        let described = index.vectors.values().filter(|v| !v.is_empty()).count();
        *self.state.write() = Some(Arc::new(index));
        info!(
            "Trained {} on {} items ({} with genres)",
            MODEL_NAME,
            items.len(),
            described
        );
        Ok(())
    }

    #[instrument(skip_all, fields(history = viewing_history.len(), candidates = candidates.len(), top_n = top_n))]
    async fn predict(
        &self,
        viewing_history: &[ItemId],
        candidates: &[ItemId],
        top_n: usize,
    ) -> ModelResult<Vec<ItemId>> {
        let index = self.state.read().clone().ok_or_else(|| ModelError::Untrained {
            model: MODEL_NAME.to_string(),
        })?;

        if viewing_history.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }

        // User profile: sum of history vectors
        let mut profile = SparseVector::new();
        for item_id in viewing_history {
            if let Some(vector) = index.vectors.get(item_id) {
                for (genre, w) in vector {
                    *profile.entry(genre.clone()).or_insert(0.0) += w;
                }
            }
        }
        if profile.is_empty() {
            debug!("No genre signal in viewing history");
            return Ok(Vec::new());
        }
        normalize(&mut profile);

        let seen: HashSet<&ItemId> = viewing_history.iter().collect();
        let mut scored: Vec<(&ItemId, f32)> = candidates
            .par_iter()
            .filter(|item_id| !seen.contains(item_id))
            .filter_map(|item_id| {
                let similarity = dot(&profile, index.vectors.get(item_id)?);
                (similarity > 0.0).then_some((item_id, similarity))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });

        let mut emitted = HashSet::new();
        let ranked: Vec<ItemId> = scored
            .into_iter()
            .filter(|(id, _)| emitted.insert(*id))
            .take(top_n)
            .map(|(id, _)| id.clone())
            .collect();

        debug!("Generated {} content candidates", ranked.len());
        Ok(ranked)
    }
}
