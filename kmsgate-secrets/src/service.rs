//! Secret service: error context around a [`SecretManager`] provider

use kmsgate_core::{ApiError, ProviderError};
use std::sync::Arc;
use thiserror::Error;

use crate::client::SecretManager;

#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("access error: {0}")]
    Access(ProviderError),

    #[error("create secret error: {0}")]
    Create(ProviderError),

    #[error("add secret version error: {0}")]
    AddVersion(ProviderError),
}

impl From<SecretsError> for ApiError {
    fn from(err: SecretsError) -> Self {
        ApiError::upstream(err)
    }
}

/// Thin adapter over Secret Manager. Calls are never retried.
pub struct SecretService {
    provider: Arc<dyn SecretManager>,
}

impl SecretService {
    pub fn new(provider: Arc<dyn SecretManager>) -> Self {
        Self { provider }
    }

    /// Payload bytes of a secret version
    pub async fn get_secret_version(&self, name: &str) -> Result<Vec<u8>, SecretsError> {
        self.provider
            .access_secret_version(name)
            .await
            .map_err(SecretsError::Access)
    }

    /// Create a secret with automatic replication
    pub async fn create_secret(&self, parent: &str, secret_id: &str) -> Result<String, SecretsError> {
        self.provider
            .create_secret(parent, secret_id)
            .await
            .map_err(SecretsError::Create)
    }

    /// Store `payload` as a new version of the secret `parent`
    pub async fn add_secret_version(&self, parent: &str, payload: &[u8]) -> Result<String, SecretsError> {
        self.provider
            .add_secret_version(parent, payload)
            .await
            .map_err(SecretsError::AddVersion)
    }

    pub fn close(&self) {
        self.provider.close();
    }
}
