//! Key service: base64 wrapping around Cloud KMS and the RSA public-key cache

use base64::{engine::general_purpose::STANDARD, Engine};
use kmsgate_core::{ApiError, ProviderError};
use rand::rngs::OsRng;
use rsa::{pkcs8::DecodePublicKey, Oaep, RsaPublicKey};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::client::KeyManagement;

#[derive(Debug, Error)]
pub enum KmsError {
    #[error("decode: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("encrypt error: {0}")]
    Encrypt(ProviderError),

    #[error("decrypt: {0}")]
    Decrypt(ProviderError),

    #[error("get public key: {0}")]
    PublicKey(ProviderError),

    #[error("parse public key {name}: {reason}")]
    InvalidPublicKey { name: String, reason: String },

    #[error("rsa encrypt: {0}")]
    RsaEncrypt(#[from] rsa::Error),

    #[error("asymmetric decrypt: {0}")]
    AsymmetricDecrypt(ProviderError),

    #[error("no asymmetric key is configured")]
    AsymmetricKeyNotConfigured,
}

impl From<KmsError> for ApiError {
    fn from(err: KmsError) -> Self {
        ApiError::upstream(err)
    }
}

/// Encrypt/decrypt on top of a [`KeyManagement`] provider.
///
/// Ciphertext crosses the HTTP boundary as standard base64. Public keys of
/// asymmetric key versions are fetched once per version and kept for the
/// life of the process.
pub struct KeyService {
    provider: Arc<dyn KeyManagement>,
    public_keys: Mutex<HashMap<String, Arc<RsaPublicKey>>>,
}

impl KeyService {
    pub fn new(provider: Arc<dyn KeyManagement>) -> Self {
        Self {
            provider,
            public_keys: Mutex::new(HashMap::new()),
        }
    }

    /// Encrypt with a symmetric key, returning base64 ciphertext
    pub async fn encrypt(&self, key_name: &str, plaintext: &[u8]) -> Result<String, KmsError> {
        let ciphertext = self
            .provider
            .encrypt(key_name, plaintext)
            .await
            .map_err(KmsError::Encrypt)?;

        Ok(STANDARD.encode(ciphertext))
    }

    /// Decrypt base64 ciphertext with a symmetric key
    pub async fn decrypt(&self, key_name: &str, b64_ciphertext: &[u8]) -> Result<Vec<u8>, KmsError> {
        let ciphertext = STANDARD.decode(b64_ciphertext)?;

        self.provider
            .decrypt(key_name, &ciphertext)
            .await
            .map_err(KmsError::Decrypt)
    }

    /// Public key of an asymmetric key version, fetched on first use.
    ///
    /// The lock is held across the fetch so concurrent first callers
    /// produce a single provider call.
    pub async fn public_key(&self, version_name: &str) -> Result<Arc<RsaPublicKey>, KmsError> {
        let mut keys = self.public_keys.lock().await;
        if let Some(key) = keys.get(version_name) {
            return Ok(key.clone());
        }

        let pem = self
            .provider
            .get_public_key(version_name)
            .await
            .map_err(KmsError::PublicKey)?;

        let key = RsaPublicKey::from_public_key_pem(&pem).map_err(|e| KmsError::InvalidPublicKey {
            name: version_name.to_string(),
            reason: e.to_string(),
        })?;

        info!(key_version = %version_name, "Cached public key");
        let key = Arc::new(key);
        keys.insert(version_name.to_string(), key.clone());
        Ok(key)
    }

    /// RSA-OAEP (SHA-256) encrypt locally with the version's public key,
    /// returning base64 ciphertext
    pub async fn encrypt_rsa(&self, version_name: &str, plaintext: &[u8]) -> Result<String, KmsError> {
        let key = self.public_key(version_name).await?;
        let ciphertext = key.encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)?;

        Ok(STANDARD.encode(ciphertext))
    }

    /// Decrypt base64 RSA ciphertext through the provider
    pub async fn decrypt_rsa(
        &self,
        version_name: &str,
        b64_ciphertext: &[u8],
    ) -> Result<Vec<u8>, KmsError> {
        let ciphertext = STANDARD.decode(b64_ciphertext)?;

        self.provider
            .asymmetric_decrypt(version_name, &ciphertext)
            .await
            .map_err(KmsError::AsymmetricDecrypt)
    }

    pub fn close(&self) {
        self.provider.close();
    }
}
