use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    Plain,
    /// Credentials; never printed by the CLI
    Secure,
}

/// Key-value parameter store with overwrite semantics
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// `Ok(None)` when the parameter does not exist
    async fn get_parameter(&self, name: &str) -> Result<Option<String>, StorageError>;

    async fn put_parameter(
        &self,
        name: &str,
        value: &str,
        kind: ParameterKind,
    ) -> Result<(), StorageError>;

    /// Deleting a missing parameter is not an error
    async fn delete_parameter(&self, name: &str) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),
}

impl From<duckdb::Error> for StorageError {
    fn from(err: duckdb::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}
