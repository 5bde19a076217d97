//! Plumbing shared by the Cloud KMS and Secret Manager REST clients

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::auth::{AuthError, TokenSource};

/// A provider call that did not produce a usable answer
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("{status} {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Attach the bearer token, send, and decode a JSON success body.
///
/// Non-2xx answers become [`ProviderError::Status`] carrying the provider's
/// error text verbatim.
pub async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    tokens: &TokenSource,
) -> Result<T, ProviderError> {
    let token = tokens.token().await?;
    let response = request.bearer_auth(token).send().await?;

    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body: text,
        });
    }

    serde_json::from_str(&text)
        .map_err(|e| ProviderError::InvalidResponse(format!("{}; body={}", e, text)))
}

/// Decode a base64 `bytes` field of a Google API response
pub fn decode_field(field: &str, value: &str) -> Result<Vec<u8>, ProviderError> {
    STANDARD
        .decode(value)
        .map_err(|e| ProviderError::InvalidResponse(format!("{} is not base64: {}", field, e)))
}
