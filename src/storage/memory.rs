use super::traits::{ParameterKind, ParameterStore, StorageError};
use crate::sink::traits::{check_append, sequence_token, LogEvent, LogSink, SinkError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Parameter store held in process memory
#[derive(Debug, Default)]
pub struct InMemoryParameterStore {
    params: Mutex<HashMap<String, (String, ParameterKind)>>,
    puts: AtomicUsize,
}

impl InMemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameters<'a>(params: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let store = Self::new();
        {
            let mut map = lock(&store.params);
            for (name, value) in params {
                map.insert(name.to_string(), (value.to_string(), ParameterKind::Plain));
            }
        }
        store
    }

    pub fn kind(&self, name: &str) -> Option<ParameterKind> {
        lock(&self.params).get(name).map(|(_, kind)| *kind)
    }

    /// Number of writes (puts and deletes) performed
    pub fn write_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ParameterStore for InMemoryParameterStore {
    async fn get_parameter(&self, name: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.params).get(name).map(|(value, _)| value.clone()))
    }

    async fn put_parameter(
        &self,
        name: &str,
        value: &str,
        kind: ParameterKind,
    ) -> Result<(), StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        lock(&self.params).insert(name.to_string(), (value.to_string(), kind));
        Ok(())
    }

    async fn delete_parameter(&self, name: &str) -> Result<(), StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        lock(&self.params).remove(name);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct StreamState {
    events: Vec<LogEvent>,
    token: Option<String>,
}

/// Ordered sink held in process memory, with the same append contract as the
/// DuckDB sink. Failures can be queued with [`InMemorySink::fail_next_put`].
#[derive(Debug, Default)]
pub struct InMemorySink {
    streams: Mutex<HashMap<(String, String), StreamState>>,
    injected: Mutex<VecDeque<SinkError>>,
    put_calls: AtomicUsize,
    create_calls: AtomicUsize,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `put_log_events` call fail with `err` before touching any stream
    pub fn fail_next_put(&self, err: SinkError) {
        lock(&self.injected).push_back(err);
    }

    pub fn events(&self, group: &str, stream: &str) -> Vec<LogEvent> {
        lock(&self.streams)
            .get(&(group.to_string(), stream.to_string()))
            .map(|state| state.events.clone())
            .unwrap_or_default()
    }

    pub fn current_token(&self, group: &str, stream: &str) -> Option<String> {
        lock(&self.streams)
            .get(&(group.to_string(), stream.to_string()))
            .and_then(|state| state.token.clone())
    }

    pub fn stream_exists(&self, group: &str, stream: &str) -> bool {
        lock(&self.streams).contains_key(&(group.to_string(), stream.to_string()))
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogSink for InMemorySink {
    async fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        events: &[LogEvent],
        sequence_token_in: Option<&str>,
    ) -> Result<Option<String>, SinkError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = lock(&self.injected).pop_front() {
            return Err(err);
        }

        let mut streams = lock(&self.streams);
        let state = streams
            .get_mut(&(group.to_string(), stream.to_string()))
            .ok_or_else(|| SinkError::StreamNotFound {
                group: group.to_string(),
                stream: stream.to_string(),
            })?;

        check_append(events, state.token.as_deref(), sequence_token_in)?;

        state.events.extend_from_slice(events);
        let next = sequence_token(state.events.len() as u64);
        state.token = Some(next.clone());
        Ok(Some(next))
    }

    async fn create_log_stream(&self, group: &str, stream: &str) -> Result<(), SinkError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let mut streams = lock(&self.streams);
        let key = (group.to_string(), stream.to_string());
        if streams.contains_key(&key) {
            return Err(SinkError::StreamAlreadyExists {
                group: group.to_string(),
                stream: stream.to_string(),
            });
        }
        streams.insert(key, StreamState::default());
        Ok(())
    }
}
