use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One event appended to an ordered stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Epoch milliseconds
    pub timestamp: i64,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("invalid sequence token, next expected token is {}", .expected.as_deref().unwrap_or("null"))]
    InvalidSequenceToken { expected: Option<String> },

    #[error("log stream '{group}/{stream}' does not exist")]
    StreamNotFound { group: String, stream: String },

    #[error("log stream '{group}/{stream}' already exists")]
    StreamAlreadyExists { group: String, stream: String },

    #[error("events rejected: {0}")]
    Rejected(String),

    #[error("sink storage error: {0}")]
    Database(String),
}

impl From<duckdb::Error> for SinkError {
    fn from(err: duckdb::Error) -> Self {
        SinkError::Database(err.to_string())
    }
}

/// An append-only sink of named streams within named groups.
///
/// Every successful append rotates the stream's sequence token; the next append
/// must present it. A stream that has never been written accepts an append
/// without a token.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Append chronologically ordered events and return the next sequence token
    async fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        events: &[LogEvent],
        sequence_token: Option<&str>,
    ) -> Result<Option<String>, SinkError>;

    async fn create_log_stream(&self, group: &str, stream: &str) -> Result<(), SinkError>;
}

/// Check the append preconditions shared by every sink implementation.
///
/// `expected` is the stream's current token (`None` for a never-written stream).
pub(crate) fn check_append(
    events: &[LogEvent],
    expected: Option<&str>,
    provided: Option<&str>,
) -> Result<(), SinkError> {
    if expected != provided {
        return Err(SinkError::InvalidSequenceToken {
            expected: expected.map(str::to_string),
        });
    }

    if events.is_empty() {
        return Err(SinkError::Rejected("no events in batch".to_string()));
    }

    if let Some(pair) = events.windows(2).find(|pair| pair[1].timestamp < pair[0].timestamp) {
        return Err(SinkError::Rejected(format!(
            "events out of chronological order: {} after {}",
            pair[1].timestamp, pair[0].timestamp
        )));
    }

    Ok(())
}

/// Token issued after `sequence` events have been appended to a stream
pub(crate) fn sequence_token(sequence: u64) -> String {
    format!("{:020}", sequence)
}
