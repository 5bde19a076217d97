//! HTTP handlers for the key routes
//!
//! The request body is the payload: plaintext for the encrypt routes, base64
//! ciphertext for the decrypt routes.

use axum::{
    extract::{rejection::BytesRejection, State},
    response::Response,
    routing::post,
    Router,
};
use bytes::Bytes;
use kmsgate_core::{respond, ApiError, ResourceNames};
use std::sync::Arc;
use tracing::debug;

use crate::service::{KeyService, KmsError};

/// Shared state for key handlers
pub struct KmsState {
    pub keys: Arc<KeyService>,
    pub names: Arc<ResourceNames>,
}

/// Routes served by this crate
pub fn router(state: Arc<KmsState>) -> Router {
    Router::new()
        .route("/encrypt", post(handle_encrypt))
        .route("/decrypt", post(handle_decrypt))
        .route("/asmencrypt", post(handle_asm_encrypt))
        .route("/asmdecrypt", post(handle_asm_decrypt))
        .with_state(state)
}

/// POST /encrypt
pub async fn handle_encrypt(
    State(state): State<Arc<KmsState>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    respond(encrypt(&state, body).await)
}

/// POST /decrypt
pub async fn handle_decrypt(
    State(state): State<Arc<KmsState>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    respond(decrypt(&state, body).await)
}

/// POST /asmencrypt
pub async fn handle_asm_encrypt(
    State(state): State<Arc<KmsState>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    respond(asm_encrypt(&state, body).await)
}

/// POST /asmdecrypt
pub async fn handle_asm_decrypt(
    State(state): State<Arc<KmsState>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    respond(asm_decrypt(&state, body).await)
}

async fn encrypt(state: &KmsState, body: Result<Bytes, BytesRejection>) -> Result<String, ApiError> {
    let plaintext = body?;
    debug!(bytes = plaintext.len(), "Encrypting payload");

    Ok(state.keys.encrypt(state.names.symmetric_key(), &plaintext).await?)
}

async fn decrypt(state: &KmsState, body: Result<Bytes, BytesRejection>) -> Result<String, ApiError> {
    let ciphertext = body?;
    debug!(bytes = ciphertext.len(), "Decrypting payload");

    let plaintext = state.keys.decrypt(state.names.symmetric_key(), &ciphertext).await?;
    Ok(String::from_utf8_lossy(&plaintext).into_owned())
}

async fn asm_encrypt(
    state: &KmsState,
    body: Result<Bytes, BytesRejection>,
) -> Result<String, ApiError> {
    let plaintext = body?;
    let version = asymmetric_key(state)?;

    Ok(state.keys.encrypt_rsa(version, &plaintext).await?)
}

async fn asm_decrypt(
    state: &KmsState,
    body: Result<Bytes, BytesRejection>,
) -> Result<String, ApiError> {
    let ciphertext = body?;
    let version = asymmetric_key(state)?;

    let plaintext = state.keys.decrypt_rsa(version, &ciphertext).await?;
    Ok(String::from_utf8_lossy(&plaintext).into_owned())
}

fn asymmetric_key(state: &KmsState) -> Result<&str, KmsError> {
    state
        .names
        .asymmetric_key_version()
        .ok_or(KmsError::AsymmetricKeyNotConfigured)
}
