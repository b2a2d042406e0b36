//! # Metadata Crate
//!
//! Optional enrichment of items from an external metadata provider.
//!
//! - **fetcher**: The `MetadataFetcher` trait the hybrid engine depends on
//! - **tmdb**: HTTP client for The Movie Database
//! - **retry**: Exponential backoff with jitter for transient failures
//! - **sync**: Merge the provider's popular list into a catalog
//! - **error**: `MetadataError` and its retry classification

pub mod error;
pub mod fetcher;
pub mod retry;
pub mod sync;
pub mod tmdb;

pub use error::{MetadataError, Result};
pub use fetcher::MetadataFetcher;
pub use retry::{RetryPolicy, with_retry};
pub use sync::{SyncSummary, sync_popular};
pub use tmdb::{MetadataConfig, TmdbClient};
