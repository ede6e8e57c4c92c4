use crate::config::types::SourceConfig;
use crate::sink::traits::LogEvent;
use crate::source::feed::{FeedError, LogFeed};
use crate::source::page::LogEntry;
use crate::source::timestamp::{TimestampError, TimestampParser};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("entry {index} on page {page} has no '{field}' field")]
    MissingTimestamp {
        page: usize,
        index: usize,
        field: String,
    },

    #[error("entry {index} on page {page}: {source}")]
    Timestamp {
        page: usize,
        index: usize,
        #[source]
        source: TimestampError,
    },

    #[error(
        "feed is not newest-first: entry {index} on page {page} ({found} ms) is newer than its predecessor ({previous} ms)"
    )]
    OutOfOrder {
        page: usize,
        index: usize,
        previous: i64,
        found: i64,
    },

    #[error("failed to encode entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Entries newer than the watermark, in the order they were discovered (newest first)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingBatch {
    pub events: Vec<LogEvent>,
    /// Largest timestamp seen, never below the starting watermark
    pub newest_ts: i64,
    pub pages_fetched: usize,
}

impl PendingBatch {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Oldest-first events, as the ordered sink requires
    pub fn into_chronological(self) -> Vec<LogEvent> {
        let mut events = self.events;
        events.reverse();
        // Stable: equal timestamps keep their reversed discovery order
        events.sort_by_key(|event| event.timestamp);
        events
    }
}

/// Walks the feed newest-to-oldest and collects every entry strictly newer than
/// the watermark, stopping at the first entry at or before it.
pub struct BatchBuilder {
    parser: TimestampParser,
    timestamp_field: String,
    verify_ordering: bool,
}

impl BatchBuilder {
    pub fn new(parser: TimestampParser, timestamp_field: impl Into<String>) -> Self {
        Self {
            parser,
            timestamp_field: timestamp_field.into(),
            verify_ordering: true,
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(
            TimestampParser::new(&config.timestamp.format),
            config.timestamp.field.clone(),
        )
        .verify_ordering(config.verify_ordering)
    }

    /// When enabled, an entry newer than the one before it aborts the build
    /// instead of silently ending the scan early.
    pub fn verify_ordering(mut self, verify: bool) -> Self {
        self.verify_ordering = verify;
        self
    }

    pub async fn build(&self, feed: &dyn LogFeed, watermark: i64) -> Result<PendingBatch, BatchError> {
        let mut batch = PendingBatch {
            events: Vec::new(),
            newest_ts: watermark,
            pages_fetched: 0,
        };
        let mut cursor: Option<String> = None;
        let mut previous_ts: Option<i64> = None;

        loop {
            let page = feed.fetch(cursor.as_deref()).await?;
            batch.pages_fetched += 1;
            let page_no = batch.pages_fetched;

            let Some(first) = page.entries.first() else {
                debug!(page = page_no, "Empty page, feed exhausted");
                break;
            };

            // Whole page already delivered; skip re-encoding it
            let first_ts = self.timestamp(first, page_no, 0)?;
            self.check_order(previous_ts, first_ts, page_no, 0)?;
            if first_ts <= watermark {
                debug!(page = page_no, first_ts, watermark, "Page already delivered");
                break;
            }

            let mut crossed = false;
            for (index, entry) in page.entries.iter().enumerate() {
                let ts = self.timestamp(entry, page_no, index)?;
                self.check_order(previous_ts, ts, page_no, index)?;
                previous_ts = Some(ts);

                if ts <= watermark {
                    crossed = true;
                    break;
                }

                batch.events.push(LogEvent {
                    timestamp: ts,
                    message: entry.to_compact_json()?,
                });
                batch.newest_ts = batch.newest_ts.max(ts);
            }

            if crossed {
                debug!(page = page_no, watermark, "Reached watermark");
                break;
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    debug!(page = page_no, "No next cursor, feed exhausted");
                    break;
                }
            }
        }

        debug!(
            new_entries = batch.events.len(),
            pages = batch.pages_fetched,
            newest_ts = batch.newest_ts,
            "Batch built"
        );
        Ok(batch)
    }

    fn timestamp(&self, entry: &LogEntry, page: usize, index: usize) -> Result<i64, BatchError> {
        let value = entry
            .field(&self.timestamp_field)
            .ok_or_else(|| BatchError::MissingTimestamp {
                page,
                index,
                field: self.timestamp_field.clone(),
            })?;

        self.parser
            .parse_value(value)
            .map_err(|source| BatchError::Timestamp {
                page,
                index,
                source,
            })
    }

    fn check_order(
        &self,
        previous: Option<i64>,
        found: i64,
        page: usize,
        index: usize,
    ) -> Result<(), BatchError> {
        match previous {
            Some(previous) if self.verify_ordering && found > previous => Err(BatchError::OutOfOrder {
                page,
                index,
                previous,
                found,
            }),
            _ => Ok(()),
        }
    }
}
