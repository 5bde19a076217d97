//! Secret Manager REST client

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use kmsgate_core::rest::{decode_field, send_json};
use kmsgate_core::{ProviderError, TokenSource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_ENDPOINT: &str = "https://secretmanager.googleapis.com/v1";

/// The Secret Manager calls kmsgate relies on
#[async_trait]
pub trait SecretManager: Send + Sync {
    /// Payload of `projects/<p>/secrets/<s>/versions/<v>`
    async fn access_secret_version(&self, name: &str) -> Result<Vec<u8>, ProviderError>;

    /// Create `<parent>/secrets/<secret_id>`, returning its resource name
    async fn create_secret(&self, parent: &str, secret_id: &str) -> Result<String, ProviderError>;

    /// Add a version to the secret `parent`, returning the version name
    async fn add_secret_version(&self, parent: &str, payload: &[u8]) -> Result<String, ProviderError>;

    /// Release the connection at shutdown
    fn close(&self) {}
}

/// Client for the Secret Manager v1 REST API
pub struct CloudSecretManager {
    endpoint: String,
    client: reqwest::Client,
    tokens: Arc<TokenSource>,
}

impl CloudSecretManager {
    pub fn new(client: reqwest::Client, tokens: Arc<TokenSource>, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        info!(endpoint = %endpoint, "Secret Manager initialized");
        Self {
            endpoint,
            client,
            tokens,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }
}

#[derive(Serialize)]
struct CreateSecretRequest {
    replication: Replication,
}

#[derive(Serialize)]
struct Replication {
    automatic: Automatic,
}

#[derive(Serialize)]
struct Automatic {}

#[derive(Serialize, Deserialize)]
struct SecretPayload {
    #[serde(default)]
    data: String,
}

#[derive(Serialize)]
struct AddSecretVersionRequest {
    payload: SecretPayload,
}

#[derive(Deserialize)]
struct AccessSecretVersionResponse {
    payload: Option<SecretPayload>,
}

/// Both Secret and SecretVersion answers; only the name is used
#[derive(Deserialize)]
struct NamedResource {
    name: String,
}

#[async_trait]
impl SecretManager for CloudSecretManager {
    async fn access_secret_version(&self, name: &str) -> Result<Vec<u8>, ProviderError> {
        debug!(secret_version = %name, "Secret Manager access");
        let request = self.client.get(self.url(&format!("{}:access", name)));

        let response: AccessSecretVersionResponse = send_json(request, &self.tokens).await?;
        let payload = response
            .payload
            .ok_or_else(|| ProviderError::InvalidResponse("secret version has no payload".into()))?;
        decode_field("payload.data", &payload.data)
    }

    async fn create_secret(&self, parent: &str, secret_id: &str) -> Result<String, ProviderError> {
        debug!(parent = %parent, secret_id = %secret_id, "Secret Manager create secret");
        let request = self
            .client
            .post(self.url(&format!("{}/secrets", parent)))
            .query(&[("secretId", secret_id)])
            .json(&CreateSecretRequest {
                replication: Replication {
                    automatic: Automatic {},
                },
            });

        let secret: NamedResource = send_json(request, &self.tokens).await?;
        Ok(secret.name)
    }

    async fn add_secret_version(&self, parent: &str, payload: &[u8]) -> Result<String, ProviderError> {
        debug!(secret = %parent, bytes = payload.len(), "Secret Manager add version");
        let request = self
            .client
            .post(self.url(&format!("{}:addVersion", parent)))
            .json(&AddSecretVersionRequest {
                payload: SecretPayload {
                    data: STANDARD.encode(payload),
                },
            });

        let version: NamedResource = send_json(request, &self.tokens).await?;
        Ok(version.name)
    }

    fn close(&self) {
        info!("Secret Manager closed");
    }
}
