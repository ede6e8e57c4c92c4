use crate::batch::builder::{BatchBuilder, BatchError};
use crate::config::types::{Config, SourceConfig};
use crate::sink::traits::{LogSink, SinkError};
use crate::sink::writer::SinkWriter;
use crate::source::feed::{FeedError, HttpFeed, LogFeed};
use crate::state::credentials::{resolve_api_key, CredentialError};
use crate::state::watermark::{StateError, WatermarkStore};
use crate::storage::traits::ParameterStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, Instrument};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("batch error: {0}")]
    Batch(#[from] BatchError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("state error: {0}")]
    State(#[from] StateError),
}

/// Result of one synchronization pass, printed as the invocation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ts: Option<i64>,
    #[serde(skip)]
    pub pushed: usize,
}

impl SyncOutcome {
    pub fn no_new_logs() -> Self {
        Self {
            message: "No new logs.".to_string(),
            last_ts: None,
            pushed: 0,
        }
    }

    pub fn pushed(count: usize, last_ts: i64) -> Self {
        Self {
            message: format!("Pushed {} logs.", count),
            last_ts: Some(last_ts),
            pushed: count,
        }
    }
}

/// Builds the feed once the API key is known
pub type FeedConnector =
    Arc<dyn Fn(&SourceConfig, String) -> Result<Arc<dyn LogFeed>, FeedError> + Send + Sync>;

fn http_feed_connector() -> FeedConnector {
    Arc::new(
        |config: &SourceConfig, api_key: String| -> Result<Arc<dyn LogFeed>, FeedError> {
            Ok(Arc::new(HttpFeed::new(config, api_key)?))
        },
    )
}

/// One synchronization pass: read watermark, build batch, append, persist.
///
/// Assumes no other run uses the same watermark and token concurrently.
pub struct SyncRunner {
    config: Config,
    store: Arc<dyn ParameterStore>,
    sink: Arc<dyn LogSink>,
    connect_feed: FeedConnector,
}

impl SyncRunner {
    pub fn new(config: Config, store: Arc<dyn ParameterStore>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            config,
            store,
            sink,
            connect_feed: http_feed_connector(),
        }
    }

    pub fn with_feed_connector(mut self, connect_feed: FeedConnector) -> Self {
        self.connect_feed = connect_feed;
        self
    }

    pub async fn run(&self) -> Result<SyncOutcome, SyncError> {
        let span = tracing::info_span!(
            "sync_run",
            run_id = %Uuid::new_v4(),
            log_group = %self.config.sink.log_group,
            log_stream = %self.config.sink.log_stream,
        );
        self.run_pass().instrument(span).await
    }

    async fn run_pass(&self) -> Result<SyncOutcome, SyncError> {
        let env_override = std::env::var(&self.config.credential.env_var).ok();
        let api_key =
            resolve_api_key(&self.config.credential, env_override, self.store.as_ref()).await?;
        let feed = (self.connect_feed)(&self.config.source, api_key)?;

        let watermarks = WatermarkStore::new(self.store.clone(), &self.config.state);
        let state = watermarks.load().await?;
        info!(watermark = state.watermark, "Starting sync pass");

        let pending = BatchBuilder::from_config(&self.config.source)
            .build(feed.as_ref(), state.watermark)
            .await?;

        if pending.is_empty() {
            info!(pages = pending.pages_fetched, "No new logs");
            return Ok(SyncOutcome::no_new_logs());
        }

        let newest_ts = pending.newest_ts;
        let pages = pending.pages_fetched;
        let events = pending.into_chronological();

        let writer = SinkWriter::from_config(self.sink.clone(), &self.config.sink);
        let next_token = writer
            .append(&events, state.write_token.as_deref())
            .await?;

        // Only a confirmed append moves the watermark
        if let Err(e) = watermarks.save(newest_ts, next_token.as_deref()).await {
            error!(
                error = %e,
                events = events.len(),
                newest_ts,
                "Batch appended but progress was not saved; the next run will deliver it again"
            );
            return Err(e.into());
        }

        info!(
            events = events.len(),
            pages,
            watermark = newest_ts,
            "Sync pass complete"
        );
        Ok(SyncOutcome::pushed(events.len(), newest_ts))
    }
}
