/// Sync pass tests against in-memory collaborators
///
/// These tests drive complete passes through SyncRunner:
/// - Early termination at the watermark
/// - Idempotent re-runs and monotonic progress
/// - Sequence token correction and stream creation
/// - Failure paths that must leave the watermark untouched
use async_trait::async_trait;
use logferry::config::{parse_config, Config, SourceConfig};
use logferry::sink::{LogSink, SinkError};
use logferry::source::{FeedError, LogEntry, LogFeed, Page};
use logferry::state::{CredentialError, WatermarkStore};
use logferry::storage::memory::{InMemoryParameterStore, InMemorySink};
use logferry::storage::{ParameterKind, ParameterStore, StorageError};
use logferry::sync::{FeedConnector, SyncError, SyncOutcome, SyncRunner};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[cfg(test)]
mod tests {
    use super::*;

    const GROUP: &str = "app-logs";
    const STREAM: &str = "poller";
    const WATERMARK_PARAM: &str = "/logferry/last-ts-ms";
    const TOKEN_PARAM: &str = "/logferry/last-seq-token";
    const SECRET_PARAM: &str = "/logferry/api-key";

    /// Helper: config using epoch-ms timestamps and a credential env var nobody sets
    fn test_config(page_size: usize) -> Config {
        let yaml = format!(
            r#"
source:
  url: https://logs.example.com/v2/logs
  page_size: {page_size}
  timestamp:
    format: epoch_ms
sink:
  log_group: {GROUP}
  log_stream: {STREAM}
credential:
  env_var: LOGFERRY_SYNC_TESTS_NEVER_SET
storage:
  path: /tmp/logferry-sync-tests.duckdb
"#
        );
        parse_config(&yaml).unwrap()
    }

    /// Newest-first feed served in fixed-size pages; cursors are page indices
    struct ScriptedFeed {
        timestamps: Mutex<Vec<i64>>,
        page_size: usize,
        fetches: AtomicUsize,
        api_keys: Mutex<Vec<String>>,
    }

    impl ScriptedFeed {
        fn new(page_size: usize, timestamps: &[i64]) -> Arc<Self> {
            let feed = Arc::new(Self {
                timestamps: Mutex::new(Vec::new()),
                page_size,
                fetches: AtomicUsize::new(0),
                api_keys: Mutex::new(Vec::new()),
            });
            feed.publish(timestamps);
            feed
        }

        /// Add entries; the feed keeps them newest first
        fn publish(&self, timestamps: &[i64]) {
            let mut all = self.timestamps.lock().unwrap();
            all.extend_from_slice(timestamps);
            all.sort_by(|a, b| b.cmp(a));
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        fn connector(self: &Arc<Self>) -> FeedConnector {
            let feed = self.clone();
            Arc::new(
                move |_: &SourceConfig, api_key: String| -> Result<Arc<dyn LogFeed>, FeedError> {
                    feed.api_keys.lock().unwrap().push(api_key);
                    Ok(feed.clone() as Arc<dyn LogFeed>)
                },
            )
        }
    }

    #[async_trait]
    impl LogFeed for ScriptedFeed {
        async fn fetch(&self, cursor: Option<&str>) -> Result<Page, FeedError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let index: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
            let all = self.timestamps.lock().unwrap();
            let chunks: Vec<&[i64]> = all.chunks(self.page_size).collect();

            let entries = chunks
                .get(index)
                .map(|chunk| {
                    chunk
                        .iter()
                        .map(|&ts| LogEntry::from(json!({"timestamp": ts, "msg": format!("entry {ts}")})))
                        .collect()
                })
                .unwrap_or_default();
            let next = (index + 1 < chunks.len()).then(|| (index + 1).to_string());
            Ok(Page::new(entries, next))
        }
    }

    /// Parameter store whose watermark writes can be made to fail
    struct FlakyStore {
        inner: InMemoryParameterStore,
        fail_writes_to: String,
        failing: AtomicBool,
    }

    #[async_trait]
    impl ParameterStore for FlakyStore {
        async fn get_parameter(&self, name: &str) -> Result<Option<String>, StorageError> {
            self.inner.get_parameter(name).await
        }

        async fn put_parameter(
            &self,
            name: &str,
            value: &str,
            kind: ParameterKind,
        ) -> Result<(), StorageError> {
            if self.failing.load(Ordering::SeqCst) && name == self.fail_writes_to {
                return Err(StorageError::Database("parameter store unavailable".to_string()));
            }
            self.inner.put_parameter(name, value, kind).await
        }

        async fn delete_parameter(&self, name: &str) -> Result<(), StorageError> {
            self.inner.delete_parameter(name).await
        }
    }

    /// Helper: store holding only the API key
    fn store_with_key() -> Arc<InMemoryParameterStore> {
        Arc::new(InMemoryParameterStore::with_parameters([(SECRET_PARAM, "key-123")]))
    }

    /// Helper: sink with the target stream already created
    async fn sink_with_stream() -> Arc<InMemorySink> {
        let sink = Arc::new(InMemorySink::new());
        sink.create_log_stream(GROUP, STREAM).await.unwrap();
        sink
    }

    fn runner(
        config: Config,
        store: Arc<dyn ParameterStore>,
        sink: Arc<InMemorySink>,
        feed: &Arc<ScriptedFeed>,
    ) -> SyncRunner {
        SyncRunner::new(config, store, sink).with_feed_connector(feed.connector())
    }

    fn delivered(sink: &InMemorySink) -> Vec<i64> {
        sink.events(GROUP, STREAM)
            .iter()
            .map(|event| event.timestamp)
            .collect()
    }

    async fn stored(store: &dyn ParameterStore, name: &str) -> Option<String> {
        store.get_parameter(name).await.unwrap()
    }

    #[tokio::test]
    async fn test_stops_at_watermark_and_delivers_oldest_first() {
        let store = Arc::new(InMemoryParameterStore::with_parameters([
            (SECRET_PARAM, "key-123"),
            (WATERMARK_PARAM, "25"),
        ]));
        let sink = sink_with_stream().await;
        let feed = ScriptedFeed::new(3, &[50, 40, 30, 20, 10, 5]);

        let outcome = runner(test_config(3), store.clone(), sink.clone(), &feed)
            .run()
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::pushed(3, 50));
        assert_eq!(delivered(&sink), vec![30, 40, 50]);
        // Second page crosses the watermark; third is never requested
        assert_eq!(feed.fetches(), 2);
        assert_eq!(stored(store.as_ref(), WATERMARK_PARAM).await.as_deref(), Some("50"));
        assert_eq!(
            stored(store.as_ref(), TOKEN_PARAM).await,
            sink.current_token(GROUP, STREAM)
        );
    }

    #[tokio::test]
    async fn test_messages_are_compact_json_of_the_entry() {
        let store = store_with_key();
        let sink = sink_with_stream().await;
        let feed = ScriptedFeed::new(10, &[7]);

        runner(test_config(10), store, sink.clone(), &feed)
            .run()
            .await
            .unwrap();

        let events = sink.events(GROUP, STREAM);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, r#"{"timestamp":7,"msg":"entry 7"}"#);
    }

    #[tokio::test]
    async fn test_second_run_without_new_entries_is_a_no_op() {
        let store = store_with_key();
        let sink = sink_with_stream().await;
        let feed = ScriptedFeed::new(2, &[3, 2, 1]);
        let config = test_config(2);

        let first = runner(config.clone(), store.clone(), sink.clone(), &feed)
            .run()
            .await
            .unwrap();
        assert_eq!(first, SyncOutcome::pushed(3, 3));

        let puts_before = sink.put_calls();
        let writes_before = store.write_count();
        let fetches_before = feed.fetches();

        let second = runner(config, store.clone(), sink.clone(), &feed)
            .run()
            .await
            .unwrap();

        assert_eq!(second, SyncOutcome::no_new_logs());
        assert_eq!(sink.put_calls(), puts_before);
        assert_eq!(store.write_count(), writes_before);
        // First page starts at the watermark, so only one page is read
        assert_eq!(feed.fetches(), fetches_before + 1);
        assert_eq!(delivered(&sink), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_watermark_only_moves_forward() {
        let store = store_with_key();
        let sink = sink_with_stream().await;
        let feed = ScriptedFeed::new(2, &[20, 10]);
        let config = test_config(2);

        runner(config.clone(), store.clone(), sink.clone(), &feed)
            .run()
            .await
            .unwrap();
        assert_eq!(stored(store.as_ref(), WATERMARK_PARAM).await.as_deref(), Some("20"));

        feed.publish(&[35, 30, 25]);
        let outcome = runner(config, store.clone(), sink.clone(), &feed)
            .run()
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::pushed(3, 35));
        assert_eq!(stored(store.as_ref(), WATERMARK_PARAM).await.as_deref(), Some("35"));
        assert_eq!(delivered(&sink), vec![10, 20, 25, 30, 35]);
    }

    #[tokio::test]
    async fn test_entries_equal_to_watermark_are_not_redelivered() {
        let store = Arc::new(InMemoryParameterStore::with_parameters([
            (SECRET_PARAM, "key-123"),
            (WATERMARK_PARAM, "20"),
        ]));
        let sink = sink_with_stream().await;
        let feed = ScriptedFeed::new(5, &[30, 20, 20, 10]);

        let outcome = runner(test_config(5), store, sink.clone(), &feed)
            .run()
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::pushed(1, 30));
        assert_eq!(delivered(&sink), vec![30]);
    }

    #[tokio::test]
    async fn test_stale_token_is_corrected_and_saved() {
        let sink = sink_with_stream().await;
        let feed = ScriptedFeed::new(5, &[9, 8]);

        // Stream already advanced past the token this run remembers
        let seed = logferry::sink::LogEvent {
            timestamp: 1,
            message: "{}".to_string(),
        };
        let live_token = sink.put_log_events(GROUP, STREAM, &[seed], None).await.unwrap();

        let store = Arc::new(InMemoryParameterStore::with_parameters([
            (SECRET_PARAM, "key-123"),
            (WATERMARK_PARAM, "5"),
            (TOKEN_PARAM, "00000000000000000099"),
        ]));

        let outcome = runner(test_config(5), store.clone(), sink.clone(), &feed)
            .run()
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::pushed(2, 9));
        assert_eq!(delivered(&sink), vec![1, 8, 9]);
        assert_ne!(sink.current_token(GROUP, STREAM), live_token);
        assert_eq!(
            stored(store.as_ref(), TOKEN_PARAM).await,
            sink.current_token(GROUP, STREAM)
        );
    }

    #[tokio::test]
    async fn test_missing_stream_is_created() {
        let store = store_with_key();
        let sink = Arc::new(InMemorySink::new());
        let feed = ScriptedFeed::new(5, &[2, 1]);

        let outcome = runner(test_config(5), store, sink.clone(), &feed)
            .run()
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::pushed(2, 2));
        assert!(sink.stream_exists(GROUP, STREAM));
        assert_eq!(sink.create_calls(), 1);
        assert_eq!(delivered(&sink), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_missing_credential_fails_before_fetching() {
        let store = Arc::new(InMemoryParameterStore::new());
        let sink = sink_with_stream().await;
        let feed = ScriptedFeed::new(5, &[1]);

        let err = runner(test_config(5), store, sink.clone(), &feed)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Credential(CredentialError::Missing { .. })
        ));
        assert_eq!(feed.fetches(), 0);
        assert_eq!(sink.put_calls(), 0);
    }

    #[tokio::test]
    async fn test_stored_credential_reaches_the_feed() {
        let store = store_with_key();
        let sink = sink_with_stream().await;
        let feed = ScriptedFeed::new(5, &[]);

        let outcome = runner(test_config(5), store, sink, &feed)
            .run()
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::no_new_logs());
        assert_eq!(*feed.api_keys.lock().unwrap(), vec!["key-123".to_string()]);
    }

    #[tokio::test]
    async fn test_rejected_append_leaves_state_untouched() {
        let store = Arc::new(InMemoryParameterStore::with_parameters([
            (SECRET_PARAM, "key-123"),
            (WATERMARK_PARAM, "10"),
        ]));
        let sink = sink_with_stream().await;
        sink.fail_next_put(SinkError::Rejected("throttled".to_string()));
        let feed = ScriptedFeed::new(5, &[30, 20, 10]);

        let err = runner(test_config(5), store.clone(), sink.clone(), &feed)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Sink(SinkError::Rejected(_))));
        assert_eq!(store.write_count(), 0);
        assert_eq!(stored(store.as_ref(), WATERMARK_PARAM).await.as_deref(), Some("10"));
        assert!(delivered(&sink).is_empty());

        // The same entries are picked up once the sink recovers
        let outcome = runner(test_config(5), store, sink.clone(), &feed)
            .run()
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::pushed(2, 30));
        assert_eq!(delivered(&sink), vec![20, 30]);
    }

    #[tokio::test]
    async fn test_lost_progress_redelivers_the_batch() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryParameterStore::with_parameters([(SECRET_PARAM, "key-123")]),
            fail_writes_to: WATERMARK_PARAM.to_string(),
            failing: AtomicBool::new(true),
        });
        let sink = sink_with_stream().await;
        let feed = ScriptedFeed::new(5, &[2, 1]);

        let err = runner(test_config(5), store.clone(), sink.clone(), &feed)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::State(_)));
        assert_eq!(delivered(&sink), vec![1, 2]);

        store.failing.store(false, Ordering::SeqCst);
        let outcome = runner(test_config(5), store.clone(), sink.clone(), &feed)
            .run()
            .await
            .unwrap();

        // At-least-once: the unrecorded batch is appended again
        assert_eq!(outcome, SyncOutcome::pushed(2, 2));
        assert_eq!(delivered(&sink), vec![1, 2, 1, 2]);

        let state = WatermarkStore::new(store, &test_config(5).state)
            .load()
            .await
            .unwrap();
        assert_eq!(state.watermark, 2);
        assert_eq!(state.write_token, sink.current_token(GROUP, STREAM));
    }

    #[tokio::test]
    async fn test_out_of_order_feed_is_refused() {
        let store = store_with_key();
        let sink = sink_with_stream().await;
        let feed = ScriptedFeed::new(5, &[]);
        // Bypass publish() sorting to serve an ascending page
        *feed.timestamps.lock().unwrap() = vec![1, 2, 3];

        let err = runner(test_config(5), store.clone(), sink.clone(), &feed)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Batch(_)));
        assert_eq!(sink.put_calls(), 0);
        assert_eq!(store.write_count(), 0);
    }
}
