//! Matrix Factorization - Native Collaborative Filtering
//!
//! Learns a latent vector and a bias per user and per item from the rating
//! matrix, then ranks candidates by predicted score:
//!
//! ```text
//! r̂(u, i) = μ + b_u + b_i + p_u · q_i
//! ```
//!
//! ## Algorithm
//! 1. Map user/item identifiers to dense indices
//! 2. Initialise factors from a seeded RNG (reproducible runs)
//! 3. Run SGD over the rating triples for a fixed number of epochs
//! 4. At predict time, score every known, unrated candidate in parallel
//! 5. Return the best `max_candidates`, best first

use crate::traits::{CollaborativeModel, ModelError, ModelResult};
use async_trait::async_trait;
use catalog::{Item, ItemId, Rating, User, UserId};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument};

const MODEL_NAME: &str = "matrix-factorization";

/// Learned parameters. Replaced wholesale on every successful train.
#[derive(Debug)]
struct Factors {
    dim: usize,
    user_index: HashMap<UserId, usize>,
    item_index: HashMap<ItemId, usize>,
    global_mean: f32,
    user_bias: Vec<f32>,
    item_bias: Vec<f32>,
    /// Row-major, `dim` floats per user
    user_factors: Vec<f32>,
    /// Row-major, `dim` floats per item
    item_factors: Vec<f32>,
    /// Items each user rated during training
    rated: HashMap<usize, HashSet<usize>>,
}

impl Factors {
    fn score(&self, user: usize, item: usize) -> f32 {
        let p = &self.user_factors[user * self.dim..(user + 1) * self.dim];
        let q = &self.item_factors[item * self.dim..(item + 1) * self.dim];
        let dot: f32 = p.iter().zip(q).map(|(a, b)| a * b).sum();
        self.global_mean + self.user_bias[user] + self.item_bias[item] + dot
    }
}

/// Hyper-parameters, copied into the blocking training task
#[derive(Debug, Clone, Copy)]
struct Hyper {
    dim: usize,
    epochs: usize,
    learning_rate: f32,
    regularization: f32,
    seed: u64,
}

/// In-process matrix-factorization predictor
pub struct MatrixFactorizationModel {
    embedding_dim: usize,
    epochs: usize,
    learning_rate: f32,
    regularization: f32,
    /// Upper bound on the number of candidates returned by `predict`
    max_candidates: usize,
    seed: u64,

    state: RwLock<Option<Arc<Factors>>>,
}

impl MatrixFactorizationModel {
    /// Create an untrained model with default hyper-parameters
    pub fn new() -> Self {
        Self {
            embedding_dim: 50,
            epochs: 10,
            learning_rate: 0.01,
            regularization: 0.02,
            max_candidates: 300,
            seed: 42,
            state: RwLock::new(None),
        }
    }

    /// Configure the latent dimension (default: 50)
    pub fn with_embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = dim.max(1);
        self
    }

    /// Configure the number of SGD epochs (default: 10)
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Configure the SGD step size (default: 0.01)
    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Configure L2 regularisation (default: 0.02)
    pub fn with_regularization(mut self, regularization: f32) -> Self {
        self.regularization = regularization;
        self
    }

    /// Configure the predict cap (default: 300)
    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = max;
        self
    }

    /// Configure the RNG seed used for initialisation and shuffling
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn is_trained(&self) -> bool {
        self.state.read().is_some()
    }

    fn hyper(&self) -> Hyper {
        Hyper {
            dim: self.embedding_dim,
            epochs: self.epochs,
            learning_rate: self.learning_rate,
            regularization: self.regularization,
            seed: self.seed,
        }
    }

    fn training_error(reason: impl Into<String>) -> ModelError {
        ModelError::Training {
            model: MODEL_NAME.to_string(),
            reason: reason.into(),
        }
    }
}

impl Default for MatrixFactorizationModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Build dense indices and training samples, dropping dangling ratings
fn index_samples(
    users: &[User],
    items: &[Item],
    ratings: &[Rating],
) -> ModelResult<(HashMap<UserId, usize>, HashMap<ItemId, usize>, Vec<(usize, usize, f32)>)> {
    let mut user_index = HashMap::new();
    for user in users {
        let next = user_index.len();
        user_index.entry(user.id.clone()).or_insert(next);
    }
    let mut item_index = HashMap::new();
    for item in items {
        let next = item_index.len();
        item_index.entry(item.id.clone()).or_insert(next);
    }

    let mut samples = Vec::with_capacity(ratings.len());
    let mut dangling = 0usize;
    for rating in ratings {
        if !rating.score.is_finite() {
            return Err(MatrixFactorizationModel::training_error(format!(
                "non-finite score {} for ({}, {})",
                rating.score, rating.user_id, rating.item_id
            )));
        }
        match (
            user_index.get(&rating.user_id),
            item_index.get(&rating.item_id),
        ) {
            (Some(&u), Some(&i)) => samples.push((u, i, rating.score)),
            _ => dangling += 1,
        }
    }
    if dangling > 0 {
        debug!("Ignored {} ratings referencing unknown users or items", dangling);
    }
    Ok((user_index, item_index, samples))
}

/// Plain SGD over the samples. CPU-bound; runs on the blocking pool.
fn fit(
    hyper: Hyper,
    user_index: HashMap<UserId, usize>,
    item_index: HashMap<ItemId, usize>,
    mut samples: Vec<(usize, usize, f32)>,
) -> Factors {
    let dim = hyper.dim;
    let mut rng = StdRng::seed_from_u64(hyper.seed);
    let mut init = |n: usize| -> Vec<f32> {
        (0..n * dim).map(|_| rng.random_range(-0.05f32..0.05)).collect()
    };
    let mut user_factors = init(user_index.len());
    let mut item_factors = init(item_index.len());
    let mut user_bias = vec![0.0f32; user_index.len()];
    let mut item_bias = vec![0.0f32; item_index.len()];

    let global_mean = samples.iter().map(|s| s.2).sum::<f32>() / samples.len() as f32;
    let (lr, reg) = (hyper.learning_rate, hyper.regularization);

    for epoch in 0..hyper.epochs {
        samples.shuffle(&mut rng);
        let mut squared_error = 0.0f32;

        for &(u, i, r) in &samples {
            let p = u * dim;
            let q = i * dim;
            let dot: f32 = (0..dim)
                .map(|k| user_factors[p + k] * item_factors[q + k])
                .sum();
            let err = r - (global_mean + user_bias[u] + item_bias[i] + dot);
            squared_error += err * err;

            user_bias[u] += lr * (err - reg * user_bias[u]);
            item_bias[i] += lr * (err - reg * item_bias[i]);
            for k in 0..dim {
                let pu = user_factors[p + k];
                let qi = item_factors[q + k];
                user_factors[p + k] += lr * (err * qi - reg * pu);
                item_factors[q + k] += lr * (err * pu - reg * qi);
            }
        }

        debug!(
            "Epoch {}, loss: {:.4}",
            epoch + 1,
            squared_error / samples.len() as f32
        );
    }

    let mut rated: HashMap<usize, HashSet<usize>> = HashMap::new();
    for &(u, i, _) in &samples {
        rated.entry(u).or_default().insert(i);
    }

    Factors {
        dim,
        user_index,
        item_index,
        global_mean,
        user_bias,
        item_bias,
        user_factors,
        item_factors,
        rated,
    }
}

#[async_trait]
impl CollaborativeModel for MatrixFactorizationModel {
    fn name(&self) -> &str {
        MODEL_NAME
    }

    #[instrument(skip_all, fields(users = users.len(), items = items.len(), ratings = ratings.len()))]
    async fn train(&self, users: &[User], items: &[Item], ratings: &[Rating]) -> ModelResult<()> {
        if ratings.is_empty() {
            return Err(Self::training_error("no ratings to train on"));
        }
        let (user_index, item_index, samples) = index_samples(users, items, ratings)?;
        if samples.is_empty() {
            return Err(Self::training_error(
                "no ratings reference known users and items",
            ));
        }

        let hyper = self.hyper();
        let sample_count = samples.len();
        let factors = tokio::task::spawn_blocking(move || fit(hyper, user_index, item_index, samples))
            .await
            .map_err(|e| Self::training_error(format!("training task failed: {}", e)))?;

        *self.state.write() = Some(Arc::new(factors));
        info!("Trained {} on {} ratings", MODEL_NAME, sample_count);
        Ok(())
    }

    #[instrument(skip(self, candidates), fields(user_id = %user.id, candidates = candidates.len()))]
    async fn predict(&self, user: &User, candidates: &[ItemId]) -> ModelResult<Vec<ItemId>> {
        // Clone the Arc so the lock is not held while scoring
        let factors = self.state.read().clone().ok_or_else(|| ModelError::Untrained {
            model: MODEL_NAME.to_string(),
        })?;

        let Some(&u) = factors.user_index.get(&user.id) else {
            debug!("User {} unseen during training, no collaborative signal", user.id);
            return Ok(Vec::new());
        };
        let rated = factors.rated.get(&u);

        let mut scored: Vec<(&ItemId, f32)> = candidates
            .par_iter()
            .filter_map(|item_id| {
                let &i = factors.item_index.get(item_id)?;
                if rated.is_some_and(|r| r.contains(&i)) {
                    return None;
                }
                Some((item_id, factors.score(u, i)))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });

        // Candidates may repeat; keep the first (best) occurrence
        let mut seen = HashSet::new();
        let ranked: Vec<ItemId> = scored
            .into_iter()
            .filter(|(id, _)| seen.insert(*id))
            .take(self.max_candidates)
            .map(|(id, _)| id.clone())
            .collect();

        debug!("Generated {} collaborative candidates", ranked.len());
        Ok(ranked)
    }
}
