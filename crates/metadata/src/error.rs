use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching item metadata
///
/// Request URLs carry the API key, so network errors never keep them.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Metadata provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed metadata response: {0}")]
    Parse(String),

    #[error("No API key configured for the metadata provider")]
    MissingCredential,

    #[error("Not a provider item id: {0:?}")]
    InvalidItemId(String),

    #[error("Invalid metadata base URL: {0}")]
    InvalidBaseUrl(String),
}

impl From<reqwest::Error> for MetadataError {
    fn from(err: reqwest::Error) -> Self {
        MetadataError::Network(err.without_url())
    }
}

impl MetadataError {
    /// Transient failures worth another attempt: network, timeout, 5xx and 429
    pub fn is_retryable(&self) -> bool {
        match self {
            MetadataError::Network(_) | MetadataError::Timeout(_) => true,
            MetadataError::Status { status, .. } => *status >= 500 || *status == 429,
            MetadataError::Parse(_)
            | MetadataError::MissingCredential
            | MetadataError::InvalidItemId(_)
            | MetadataError::InvalidBaseUrl(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;
