//! Cloud KMS REST client

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use kmsgate_core::rest::{decode_field, send_json};
use kmsgate_core::{ProviderError, TokenSource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_ENDPOINT: &str = "https://cloudkms.googleapis.com/v1";

/// The Cloud KMS calls kmsgate relies on.
///
/// Names are full resource names: a crypto key for the symmetric calls, a
/// crypto key version for the asymmetric ones.
#[async_trait]
pub trait KeyManagement: Send + Sync {
    /// Raw ciphertext for `plaintext`
    async fn encrypt(&self, name: &str, plaintext: &[u8]) -> Result<Vec<u8>, ProviderError>;

    async fn decrypt(&self, name: &str, ciphertext: &[u8]) -> Result<Vec<u8>, ProviderError>;

    /// PEM encoded public half of an asymmetric key version
    async fn get_public_key(&self, name: &str) -> Result<String, ProviderError>;

    async fn asymmetric_decrypt(
        &self,
        name: &str,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, ProviderError>;

    /// Release the connection at shutdown
    fn close(&self) {}
}

/// Client for the Cloud KMS v1 REST API
pub struct CloudKms {
    endpoint: String,
    client: reqwest::Client,
    tokens: Arc<TokenSource>,
}

impl CloudKms {
    /// Create a client targeting `endpoint` (normally [`DEFAULT_ENDPOINT`])
    pub fn new(client: reqwest::Client, tokens: Arc<TokenSource>, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        info!(endpoint = %endpoint, "Cloud KMS initialized");
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
struct EncryptRequest {
    plaintext: String,
}

#[derive(Deserialize)]
struct EncryptResponse {
    ciphertext: String,
}

#[derive(Serialize)]
struct DecryptRequest {
    ciphertext: String,
}

#[derive(Deserialize)]
struct DecryptResponse {
    #[serde(default)]
    plaintext: String,
}

#[derive(Deserialize)]
struct PublicKeyResponse {
    pem: String,
}

#[async_trait]
impl KeyManagement for CloudKms {
    async fn encrypt(&self, name: &str, plaintext: &[u8]) -> Result<Vec<u8>, ProviderError> {
        debug!(key = %name, bytes = plaintext.len(), "KMS encrypt");
        let request = self
            .client
            .post(self.url(&format!("{}:encrypt", name)))
            .json(&EncryptRequest {
                plaintext: STANDARD.encode(plaintext),
            });

        let response: EncryptResponse = send_json(request, &self.tokens).await?;
        decode_field("ciphertext", &response.ciphertext)
    }

    async fn decrypt(&self, name: &str, ciphertext: &[u8]) -> Result<Vec<u8>, ProviderError> {
        debug!(key = %name, bytes = ciphertext.len(), "KMS decrypt");
        let request = self
            .client
            .post(self.url(&format!("{}:decrypt", name)))
            .json(&DecryptRequest {
                ciphertext: STANDARD.encode(ciphertext),
            });

        let response: DecryptResponse = send_json(request, &self.tokens).await?;
        decode_field("plaintext", &response.plaintext)
    }

    async fn get_public_key(&self, name: &str) -> Result<String, ProviderError> {
        debug!(key_version = %name, "KMS get public key");
        let request = self.client.get(self.url(&format!("{}/publicKey", name)));

        let response: PublicKeyResponse = send_json(request, &self.tokens).await?;
        Ok(response.pem)
    }

    async fn asymmetric_decrypt(
        &self,
        name: &str,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, ProviderError> {
        debug!(key_version = %name, bytes = ciphertext.len(), "KMS asymmetric decrypt");
        let request = self
            .client
            .post(self.url(&format!("{}:asymmetricDecrypt", name)))
            .json(&DecryptRequest {
                ciphertext: STANDARD.encode(ciphertext),
            });

        let response: DecryptResponse = send_json(request, &self.tokens).await?;
        decode_field("plaintext", &response.plaintext)
    }

    fn close(&self) {
        info!("Cloud KMS closed");
    }
}
