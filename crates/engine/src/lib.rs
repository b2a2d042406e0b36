//! Hybrid recommendation engine.
//!
//! Trains a collaborative and a content predictor on the same catalog view,
//! queries both at inference time and merges their best-first lists.

pub mod config;
pub mod error;
pub mod hybrid;
pub mod merge;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use hybrid::HybridEngine;
pub use merge::{merge_candidates, merge_recommendations};
