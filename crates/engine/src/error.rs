use metadata::MetadataError;
use models::ModelError;
use thiserror::Error;

/// Errors surfaced by the hybrid engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// Recommend was called before a successful train, or a predictor
    /// reported it has no trained state
    #[error("{model} has not been trained")]
    UntrainedModel { model: String },

    #[error("Training failed in {model}: {reason}")]
    TrainingFailure { model: String, reason: String },

    #[error("Prediction failed in {model}: {reason}")]
    Prediction { model: String, reason: String },

    #[error("Model service unavailable: {0}")]
    Transport(String),

    /// The catalog has no item with this id
    #[error("Unknown item {item_id}")]
    UnknownItem { item_id: String },

    #[error("Metadata enrichment failed: {0}")]
    Metadata(#[from] MetadataError),
}

impl From<ModelError> for EngineError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Untrained { model } => EngineError::UntrainedModel { model },
            ModelError::Training { model, reason } => EngineError::TrainingFailure { model, reason },
            ModelError::Prediction { model, reason } => EngineError::Prediction { model, reason },
            ModelError::Transport(msg) => EngineError::Transport(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
