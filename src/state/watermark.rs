use crate::config::types::StateConfig;
use crate::storage::traits::{ParameterKind, ParameterStore, StorageError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("parameter '{param}' holds '{value}', which is not an epoch-millisecond watermark")]
    InvalidWatermark { param: String, value: String },
}

/// Progress carried between runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    /// Epoch milliseconds of the newest entry already appended; 0 before the first run
    pub watermark: i64,
    /// Token for the next append; absent before the first append or after a reset
    pub write_token: Option<String>,
}

/// Reads and writes the watermark and write token parameters
pub struct WatermarkStore {
    store: Arc<dyn ParameterStore>,
    watermark_param: String,
    token_param: String,
}

impl WatermarkStore {
    pub fn new(store: Arc<dyn ParameterStore>, config: &StateConfig) -> Self {
        Self {
            store,
            watermark_param: config.watermark_param.clone(),
            token_param: config.token_param.clone(),
        }
    }

    /// Read both values. Missing parameters fall back to watermark 0 and no token.
    pub async fn load(&self) -> Result<SyncState, StateError> {
        let watermark = match self.store.get_parameter(&self.watermark_param).await? {
            Some(value) => value.trim().parse::<i64>().map_err(|_| StateError::InvalidWatermark {
                param: self.watermark_param.clone(),
                value: value.clone(),
            })?,
            None => 0,
        };

        let write_token = self
            .store
            .get_parameter(&self.token_param)
            .await?
            .filter(|token| !token.is_empty());

        tracing::debug!(
            watermark,
            has_token = write_token.is_some(),
            "Loaded sync state"
        );

        Ok(SyncState {
            watermark,
            write_token,
        })
    }

    /// Persist progress after a confirmed append.
    ///
    /// The watermark is written first: losing the token afterwards only costs one
    /// stale-token correction on the next run.
    pub async fn save(&self, watermark: i64, write_token: Option<&str>) -> Result<(), StateError> {
        self.store
            .put_parameter(&self.watermark_param, &watermark.to_string(), ParameterKind::Plain)
            .await?;

        if let Some(token) = write_token {
            self.store
                .put_parameter(&self.token_param, token, ParameterKind::Plain)
                .await?;
        }

        tracing::debug!(watermark, "Saved sync state");
        Ok(())
    }

    /// Overwrite the watermark and forget the write token
    pub async fn reset(&self, watermark: i64) -> Result<(), StateError> {
        self.store
            .put_parameter(&self.watermark_param, &watermark.to_string(), ParameterKind::Plain)
            .await?;
        self.store.delete_parameter(&self.token_param).await?;

        tracing::info!(watermark, "Reset sync state");
        Ok(())
    }
}
