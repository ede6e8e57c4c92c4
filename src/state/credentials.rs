use crate::config::types::CredentialConfig;
use crate::storage::traits::{ParameterStore, StorageError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("missing API key: set the {env_var} environment variable or the '{secret_param}' parameter")]
    Missing { env_var: String, secret_param: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Resolve the feed API key.
///
/// A non-empty environment override wins and avoids touching the store. The
/// caller reads the environment so tests never mutate process state.
pub async fn resolve_api_key(
    config: &CredentialConfig,
    env_override: Option<String>,
    store: &dyn ParameterStore,
) -> Result<String, CredentialError> {
    if let Some(key) = env_override.filter(|key| !key.is_empty()) {
        tracing::debug!(env_var = %config.env_var, "Using API key from environment");
        return Ok(key);
    }

    match store.get_parameter(&config.secret_param).await? {
        Some(key) if !key.is_empty() => {
            tracing::debug!(param = %config.secret_param, "Using API key from parameter store");
            Ok(key)
        }
        _ => Err(CredentialError::Missing {
            env_var: config.env_var.clone(),
            secret_param: config.secret_param.clone(),
        }),
    }
}
