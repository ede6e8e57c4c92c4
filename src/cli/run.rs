use crate::config::parse::load_config;
use crate::config::types::Config;
use crate::storage::duckdb::DuckDbStorage;
use crate::sync::{SyncError, SyncOutcome, SyncRunner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::parse::ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::traits::StorageError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("failed to encode result: {0}")]
    Output(#[from] serde_json::Error),

    #[error(
        "config not found in ~/.config/logferry/config.yml or /etc/logferry/config.yml; \
         use --config <path> to specify one, or run 'logferry config init' to generate one"
    )]
    ConfigNotFound,
}

/// Fail with a hint when no config file could be found
pub fn require_config_path(config_path: Option<PathBuf>) -> Result<PathBuf, RunError> {
    config_path.ok_or(RunError::ConfigNotFound)
}

/// Open the DuckDB file named in the config and make sure its tables exist
pub async fn open_storage(config: &Config) -> Result<Arc<DuckDbStorage>, RunError> {
    info!(path = %config.storage.path.display(), "Opening storage");
    let storage = Arc::new(DuckDbStorage::new(&config.storage.path)?);
    storage.init_schema().await?;
    Ok(storage)
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = require_config_path(config_path)?;

    let outcome = run_once(&config_path).await?;
    println!("{}", serde_json::to_string(&outcome)?);
    Ok(())
}

async fn run_once(config_path: &Path) -> Result<SyncOutcome, RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;

    let storage = open_storage(&config).await?;
    let runner = SyncRunner::new(config, storage.clone(), storage);

    Ok(runner.run().await?)
}
