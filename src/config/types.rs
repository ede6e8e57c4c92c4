use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub sink: SinkConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub credential: CredentialConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Feed endpoint, queried with `limit`, `sort` and `next` parameters
    pub url: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    /// Key under `_embedded` holding the page's entries
    #[serde(default = "default_collection_key")]
    pub collection_key: String,
    #[serde(default)]
    pub timestamp: TimestampConfig,
    /// Abort the run when the feed is not newest-first
    #[serde(default = "default_verify_ordering")]
    pub verify_ordering: bool,
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

fn default_page_size() -> usize {
    100
}

fn default_api_key_header() -> String {
    "X-API-KEY".to_string()
}

fn default_collection_key() -> String {
    "logEntry".to_string()
}

fn default_verify_ordering() -> bool {
    true
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(3)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampConfig {
    #[serde(default = "default_timestamp_field")]
    pub field: String,
    /// One of: 'iso8601', 'epoch', 'epoch_ms', or a strptime format string
    #[serde(default = "default_timestamp_format")]
    pub format: String,
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            field: default_timestamp_field(),
            format: default_timestamp_format(),
        }
    }
}

fn default_timestamp_field() -> String {
    "timestamp".to_string()
}

fn default_timestamp_format() -> String {
    "iso8601".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(rename = "type", default = "default_sink_type")]
    pub sink_type: SinkType,
    pub log_group: String,
    pub log_stream: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkType {
    Duckdb,
}

fn default_sink_type() -> SinkType {
    SinkType::Duckdb
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_watermark_param")]
    pub watermark_param: String,
    #[serde(default = "default_token_param")]
    pub token_param: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            watermark_param: default_watermark_param(),
            token_param: default_token_param(),
        }
    }
}

fn default_watermark_param() -> String {
    "/logferry/last-ts-ms".to_string()
}

fn default_token_param() -> String {
    "/logferry/last-seq-token".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Environment variable checked before the parameter store
    #[serde(default = "default_credential_env_var")]
    pub env_var: String,
    #[serde(default = "default_secret_param")]
    pub secret_param: String,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            env_var: default_credential_env_var(),
            secret_param: default_secret_param(),
        }
    }
}

fn default_credential_env_var() -> String {
    "LOGFERRY_API_KEY".to_string()
}

fn default_secret_param() -> String {
    "/logferry/api-key".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub path: PathBuf,
}
