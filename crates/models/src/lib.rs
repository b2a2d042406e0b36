//! # Models Crate
//!
//! The two predictors behind the hybrid engine, as traits plus native and
//! remote implementations.
//!
//! ## Main Components
//!
//! - **traits**: `CollaborativeModel` and `ContentModel`, and their error type
//! - **collaborative**: Matrix factorization trained by SGD over the rating matrix
//! - **content**: Genre TF-IDF vectors with cosine similarity
//! - **remote**: Both traits implemented over the model-serving gRPC boundary
//! - **types**: Ranked candidates consumed by the merge step
//!
//! ## Example Usage
//!
//! ```ignore
//! use models::{CollaborativeModel, MatrixFactorizationModel};
//!
//! let model = MatrixFactorizationModel::new().with_seed(7);
//! model.train(catalog.users(), catalog.items(), catalog.ratings()).await?;
//! let ranked = model.predict(user, &catalog.all_item_ids()).await?;
//! ```

pub mod collaborative;
pub mod content;
pub mod remote;
pub mod traits;
pub mod types;

pub use collaborative::MatrixFactorizationModel;
pub use content::GenreTfIdfModel;
pub use remote::{ModelServingContext, RemoteCollaborativeModel, RemoteContentModel};
pub use traits::{CollaborativeModel, ContentModel, ModelError, ModelResult};
pub use types::{CandidateSource, RankedCandidate, rank_candidates};
