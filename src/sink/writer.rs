use super::traits::{LogEvent, LogSink, SinkError};
use crate::config::types::SinkConfig;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Appends batches to one stream, correcting the two recoverable failures of the
/// append protocol with a single retry each: a stale sequence token and a
/// missing stream.
pub struct SinkWriter {
    sink: Arc<dyn LogSink>,
    group: String,
    stream: String,
}

impl SinkWriter {
    pub fn new(sink: Arc<dyn LogSink>, group: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            sink,
            group: group.into(),
            stream: stream.into(),
        }
    }

    pub fn from_config(sink: Arc<dyn LogSink>, config: &SinkConfig) -> Self {
        Self::new(sink, config.log_group.clone(), config.log_stream.clone())
    }

    /// Append a chronological batch and return the token for the next append
    pub async fn append(
        &self,
        events: &[LogEvent],
        token: Option<&str>,
    ) -> Result<Option<String>, SinkError> {
        debug!(
            group = %self.group,
            stream = %self.stream,
            events = events.len(),
            has_token = token.is_some(),
            "Appending batch"
        );

        match self.put(events, token).await {
            Ok(next) => Ok(next),
            Err(SinkError::InvalidSequenceToken {
                expected: Some(expected),
            }) => {
                warn!(
                    group = %self.group,
                    stream = %self.stream,
                    "Sequence token was stale, retrying with the expected token"
                );
                self.put(events, Some(&expected)).await
            }
            Err(SinkError::StreamNotFound { .. }) => {
                info!(
                    group = %self.group,
                    stream = %self.stream,
                    "Log stream does not exist, creating it"
                );
                self.ensure_stream().await?;
                self.put(events, None).await
            }
            Err(e) => Err(e),
        }
    }

    async fn put(
        &self,
        events: &[LogEvent],
        token: Option<&str>,
    ) -> Result<Option<String>, SinkError> {
        self.sink
            .put_log_events(&self.group, &self.stream, events, token)
            .await
    }

    async fn ensure_stream(&self) -> Result<(), SinkError> {
        match self.sink.create_log_stream(&self.group, &self.stream).await {
            Ok(()) => Ok(()),
            Err(SinkError::StreamAlreadyExists { .. }) => {
                debug!(stream = %self.stream, "Log stream was created concurrently");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
