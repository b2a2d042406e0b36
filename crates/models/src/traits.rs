//! Capability traits for the two predictors.
//!
//! The hybrid engine only ever sees `dyn CollaborativeModel` and
//! `dyn ContentModel`; whether a model runs in-process or behind the
//! model-serving RPC boundary is invisible to it.
//!
//! ## Design Note
//! - `Send + Sync` lets the engine share models across tasks behind `Arc`
//! - `train` takes `&self`: implementations guard their state internally
//! - Methods are async because one family of implementations is a network call

use async_trait::async_trait;
use catalog::{Item, ItemId, Rating, User};
use thiserror::Error;

/// Errors a predictor can report
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// `predict` was called before a successful `train`
    #[error("{model} model has not been trained")]
    Untrained { model: String },

    /// The model rejected its training input
    #[error("{model} model training failed: {reason}")]
    Training { model: String, reason: String },

    /// The model failed while producing candidates
    #[error("{model} model prediction failed: {reason}")]
    Prediction { model: String, reason: String },

    /// The model-serving boundary could not be reached
    #[error("model transport error: {0}")]
    Transport(String),
}

/// Convenience type alias for predictor results
pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// Learns from the user-item rating matrix.
#[async_trait]
pub trait CollaborativeModel: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Train on (user, item, rating) triples.
    ///
    /// Ratings that reference unknown users or items may be ignored or
    /// rejected; that is the implementation's choice.
    async fn train(&self, users: &[User], items: &[Item], ratings: &[Rating]) -> ModelResult<()>;

    /// Rank `candidates` for `user`, best first.
    ///
    /// The result is bounded by an implementation-defined cap.
    /// Fails with [`ModelError::Untrained`] before training.
    async fn predict(&self, user: &User, candidates: &[ItemId]) -> ModelResult<Vec<ItemId>>;
}

/// Learns from item features only; never sees ratings.
#[async_trait]
pub trait ContentModel: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Train on item features
    async fn train(&self, items: &[Item]) -> ModelResult<()>;

    /// Rank `candidates` by similarity to `viewing_history`, best first,
    /// returning at most `top_n` identifiers.
    ///
    /// An empty history yields an empty list, not an error.
    async fn predict(
        &self,
        viewing_history: &[ItemId],
        candidates: &[ItemId],
        top_n: usize,
    ) -> ModelResult<Vec<ItemId>>;
}
