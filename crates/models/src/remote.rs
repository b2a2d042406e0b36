//! Predictors served over the model-serving gRPC boundary.
//!
//! A [`ModelServingContext`] owns the connection. It is created once at
//! startup, handed out by reference to build the remote models, and torn
//! down explicitly with [`ModelServingContext::shutdown`]. Nothing here is
//! global.
//!
//! Status codes coming back from the service map onto [`ModelError`]:
//! - `FAILED_PRECONDITION` -> `Untrained`
//! - `INVALID_ARGUMENT` -> `Training` or `Prediction`, depending on the call
//! - anything else -> `Transport`

use crate::traits::{CollaborativeModel, ContentModel, ModelError, ModelResult};
use async_trait::async_trait;
use catalog::{Item, ItemId, Rating, User};
use parking_lot::RwLock;
use std::sync::Arc;
use tonic::transport::Channel;
use tonic::{Code, Status};
use tracing::{debug, error, info, instrument};

// Include the generated protobuf code
pub mod proto {
    tonic::include_proto!("models");
}

use proto::model_serving_client::ModelServingClient;
use proto::{
    ItemRecord, PredictCollaborativeRequest, PredictContentRequest, RatingRecord,
    TrainCollaborativeRequest, TrainContentRequest, UserRecord,
};

const REMOTE_COLLABORATIVE: &str = "remote-collaborative";
const REMOTE_CONTENT: &str = "remote-content";

// ============================================================================
// Wire conversions
// ============================================================================

impl From<&User> for UserRecord {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            viewing_history: user.viewing_history.clone(),
        }
    }
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        User::new(record.id).with_history(record.viewing_history)
    }
}

impl From<&Item> for ItemRecord {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            category: item.category.clone(),
            genres: item.genres.iter().cloned().collect(),
        }
    }
}

impl From<ItemRecord> for Item {
    fn from(record: ItemRecord) -> Self {
        let mut item = Item::bare(record.id);
        item.name = record.name;
        if !record.category.is_empty() {
            item.category = record.category;
        }
        item.genres = record.genres.into_iter().collect();
        item
    }
}

impl From<&Rating> for RatingRecord {
    fn from(rating: &Rating) -> Self {
        Self {
            user_id: rating.user_id.clone(),
            item_id: rating.item_id.clone(),
            score: rating.score,
        }
    }
}

impl From<RatingRecord> for Rating {
    fn from(record: RatingRecord) -> Self {
        Rating::new(record.user_id, record.item_id, record.score)
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Train,
    Predict,
}

fn status_to_error(model: &str, phase: Phase, status: Status) -> ModelError {
    let model = model.to_string();
    match (status.code(), phase) {
        (Code::FailedPrecondition, _) => ModelError::Untrained { model },
        (Code::InvalidArgument, Phase::Train) => ModelError::Training {
            model,
            reason: status.message().to_string(),
        },
        (Code::InvalidArgument, Phase::Predict) => ModelError::Prediction {
            model,
            reason: status.message().to_string(),
        },
        (code, _) => {
            error!("{} call failed with {:?}: {}", model, code, status.message());
            ModelError::Transport(format!("{}: {}", model, status.message()))
        }
    }
}

// ============================================================================
// Connection context
// ============================================================================

/// Channel shared by a context and the models built from it; emptied by
/// [`ModelServingContext::shutdown`]
type ChannelSlot = Arc<RwLock<Option<Channel>>>;

fn client_for(slot: &ChannelSlot, model: &str) -> ModelResult<ModelServingClient<Channel>> {
    slot.read()
        .as_ref()
        .map(|channel| ModelServingClient::new(channel.clone()))
        .ok_or_else(|| ModelError::Transport(format!("{}: connection has been shut down", model)))
}

/// Connection to the model-serving service.
pub struct ModelServingContext {
    channel: ChannelSlot,
    service_addr: String,
}

impl ModelServingContext {
    /// Connect to the model-serving service.
    ///
    /// # Arguments
    /// * `addr` - Address of the gRPC service (e.g., "http://localhost:50051")
    pub async fn connect(addr: impl Into<String>) -> ModelResult<Self> {
        let addr = addr.into();
        info!("Connecting to model service at {}", addr);

        let channel = Channel::from_shared(addr.clone())
            .map_err(|e| ModelError::Transport(format!("invalid address {}: {}", addr, e)))?
            .connect()
            .await
            .map_err(|e| {
                error!("Failed to connect to model service at {}: {}", addr, e);
                ModelError::Transport(format!("connecting to {}: {}", addr, e))
            })?;

        Ok(Self {
            channel: Arc::new(RwLock::new(Some(channel))),
            service_addr: addr,
        })
    }

    /// Get the address of the model service this context is connected to.
    pub fn service_address(&self) -> &str {
        &self.service_addr
    }

    /// Close the connection.
    ///
    /// Every remote model built from this context loses its channel at the
    /// same time: later calls fail with [`ModelError::Transport`]. Calls
    /// already in flight run to completion on the handle they hold.
    pub fn shutdown(self) {
        info!("Closing model service connection to {}", self.service_addr);
        self.channel.write().take();
    }
}

// ============================================================================
// Remote predictors
// ============================================================================

/// Collaborative predictor living in the model-serving process
#[derive(Clone)]
pub struct RemoteCollaborativeModel {
    channel: ChannelSlot,
}

impl RemoteCollaborativeModel {
    pub fn new(context: &ModelServingContext) -> Self {
        Self {
            channel: Arc::clone(&context.channel),
        }
    }
}

#[async_trait]
impl CollaborativeModel for RemoteCollaborativeModel {
    fn name(&self) -> &str {
        REMOTE_COLLABORATIVE
    }

    #[instrument(skip_all, fields(ratings = ratings.len()))]
    async fn train(&self, users: &[User], items: &[Item], ratings: &[Rating]) -> ModelResult<()> {
        let request = TrainCollaborativeRequest {
            users: users.iter().map(UserRecord::from).collect(),
            items: items.iter().map(ItemRecord::from).collect(),
            ratings: ratings.iter().map(RatingRecord::from).collect(),
        };

        let mut client = client_for(&self.channel, self.name())?;
        let response = client
            .train_collaborative(request)
            .await
            .map_err(|s| status_to_error(REMOTE_COLLABORATIVE, Phase::Train, s))?;

        debug!("Service accepted {} samples", response.into_inner().samples);
        Ok(())
    }

    #[instrument(skip(self, candidates), fields(user_id = %user.id, candidates = candidates.len()))]
    async fn predict(&self, user: &User, candidates: &[ItemId]) -> ModelResult<Vec<ItemId>> {
        let request = PredictCollaborativeRequest {
            user: Some(UserRecord::from(user)),
            candidate_item_ids: candidates.to_vec(),
        };

        let mut client = client_for(&self.channel, self.name())?;
        let response = client
            .predict_collaborative(request)
            .await
            .map_err(|s| status_to_error(REMOTE_COLLABORATIVE, Phase::Predict, s))?;

        Ok(response.into_inner().item_ids)
    }
}

/// Content predictor living in the model-serving process
#[derive(Clone)]
pub struct RemoteContentModel {
    channel: ChannelSlot,
}

impl RemoteContentModel {
    pub fn new(context: &ModelServingContext) -> Self {
        Self {
            channel: Arc::clone(&context.channel),
        }
    }
}

#[async_trait]
impl ContentModel for RemoteContentModel {
    fn name(&self) -> &str {
        REMOTE_CONTENT
    }

    #[instrument(skip_all, fields(items = items.len()))]
    async fn train(&self, items: &[Item]) -> ModelResult<()> {
        let request = TrainContentRequest {
            items: items.iter().map(ItemRecord::from).collect(),
        };

        let mut client = client_for(&self.channel, self.name())?;
        let response = client
            .train_content(request)
            .await
            .map_err(|s| status_to_error(REMOTE_CONTENT, Phase::Train, s))?;

        debug!("Service accepted {} samples", response.into_inner().samples);
        Ok(())
    }

    #[instrument(skip_all, fields(history = viewing_history.len(), top_n = top_n))]
    async fn predict(
        &self,
        viewing_history: &[ItemId],
        candidates: &[ItemId],
        top_n: usize,
    ) -> ModelResult<Vec<ItemId>> {
        let request = PredictContentRequest {
            viewing_history: viewing_history.to_vec(),
            candidate_item_ids: candidates.to_vec(),
            top_n: u32::try_from(top_n).unwrap_or(u32::MAX),
        };

        let mut client = client_for(&self.channel, self.name())?;
        let response = client
            .predict_content(request)
            .await
            .map_err(|s| status_to_error(REMOTE_CONTENT, Phase::Predict, s))?;

        // Guard against a service that ignores top_n
        let mut item_ids = response.into_inner().item_ids;
        item_ids.truncate(top_n);
        Ok(item_ids)
    }
}
