use std::sync::{Arc, Mutex, PoisonError};

use log::{error, info, warn};
use serde_json::Value;
use tokio::task;

use super::{
    check_declared_size, process, EncodedAvatar, ImageAsset, IngestError,
    AVATAR_FIELD,
};
use crate::store::{Document, ProfileStore};

/// Lifecycle of the most recent ingestion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Processing,
    Done,
    Failed,
}

/// Turns an [`ImageAsset`] into an [`EncodedAvatar`] and writes it to the
/// user's profile document. One ingestion at a time: a call made while
/// another is `Processing` fails with [`IngestError::Busy`].
pub struct AvatarPipeline {
    store: Arc<dyn ProfileStore>,
    collection: String,
    state: Mutex<PipelineState>,
}

/// Holds the pipeline in `Processing` until finished. Dropping it
/// unfinished (the future was cancelled) leaves the state `Failed`.
struct InFlight<'a> {
    state: &'a Mutex<PipelineState>,
    outcome: PipelineState,
}

impl<'a> InFlight<'a> {
    fn claim(state: &'a Mutex<PipelineState>) -> Result<Self, IngestError> {
        let mut current = state.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == PipelineState::Processing {
            return Err(IngestError::Busy);
        }
        *current = PipelineState::Processing;

        Ok(Self {
            state,
            outcome: PipelineState::Failed,
        })
    }

    fn succeed(mut self) {
        self.outcome = PipelineState::Done;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = self.outcome;
    }
}

impl AvatarPipeline {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            state: Mutex::new(PipelineState::Idle),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the whole pipeline for user `uid`.
    ///
    /// The profile document is only written when every earlier stage
    /// succeeded, and only the avatar field is replaced. Failures are logged
    /// with their stage.
    pub async fn ingest(
        &self,
        uid: &str,
        asset: ImageAsset,
    ) -> Result<EncodedAvatar, IngestError> {
        if let Err(e) = check_declared_size(asset.declared_size()) {
            warn!("rejected avatar {} for {uid}: {e}", asset.name());
            return Err(e);
        }

        let in_flight = InFlight::claim(&self.state).map_err(|e| {
            warn!("rejected avatar {} for {uid}: {e}", asset.name());
            e
        })?;

        match self.run(uid, asset).await {
            Ok(avatar) => {
                in_flight.succeed();
                Ok(avatar)
            }
            Err(e) => {
                error!(
                    "avatar ingestion for {uid} failed at {} stage: {e}",
                    e.stage()
                );
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        uid: &str,
        asset: ImageAsset,
    ) -> Result<EncodedAvatar, IngestError> {
        let name = asset.name().to_owned();
        let avatar = task::spawn_blocking(move || process(asset))
            .await
            .map_err(IngestError::Worker)??;

        let mut fields = Document::new();
        fields.insert(
            AVATAR_FIELD.to_owned(),
            Value::String(avatar.as_str().to_owned()),
        );
        self.store
            .update(&self.collection, uid, fields)
            .await
            .map_err(IngestError::Persist)?;

        info!(
            "stored avatar from {name} for {uid} ({} bytes encoded)",
            avatar.len()
        );
        Ok(avatar)
    }
}
