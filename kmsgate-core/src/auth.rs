//! Bearer tokens for the Google REST APIs
//!
//! A token is either supplied up front (`GOOGLE_OAUTH_ACCESS_TOKEN`) or read
//! from the instance metadata server, which is what Cloud Run and GCE expose
//! for the attached service account.

use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before the server-reported expiry
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("metadata token request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("metadata token request failed: {status} {body}")]
    Status { status: u16, body: String },
}

/// Source of the `Authorization` header sent to KMS and Secret Manager
pub struct TokenSource {
    inner: Inner,
}

enum Inner {
    Fixed(String),
    Metadata {
        client: reqwest::Client,
        url: String,
        cached: Mutex<Option<CachedToken>>,
    },
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

impl TokenSource {
    /// Always send the same token
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            inner: Inner::Fixed(token.into()),
        }
    }

    /// Fetch tokens from the default metadata server
    pub fn metadata(client: reqwest::Client) -> Self {
        Self::metadata_at(client, METADATA_TOKEN_URL)
    }

    pub fn metadata_at(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            inner: Inner::Metadata {
                client,
                url: url.into(),
                cached: Mutex::new(None),
            },
        }
    }

    /// Current access token, fetching a fresh one when the cached one is
    /// about to expire
    pub async fn token(&self) -> Result<String, AuthError> {
        match &self.inner {
            Inner::Fixed(token) => Ok(token.clone()),
            Inner::Metadata {
                client,
                url,
                cached,
            } => {
                let mut cached = cached.lock().await;
                if let Some(token) = cached.as_ref() {
                    if Instant::now() < token.refresh_at {
                        return Ok(token.value.clone());
                    }
                }

                let fresh = fetch_metadata_token(client, url).await?;
                let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(REFRESH_MARGIN);
                debug!(expires_in = fresh.expires_in, "Fetched access token from metadata server");

                let value = fresh.access_token;
                *cached = Some(CachedToken {
                    value: value.clone(),
                    refresh_at: Instant::now() + lifetime,
                });
                Ok(value)
            }
        }
    }
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Inner::Fixed(_) => f.write_str("TokenSource::Fixed(<redacted>)"),
            Inner::Metadata { url, .. } => write!(f, "TokenSource::Metadata({})", url),
        }
    }
}

async fn fetch_metadata_token(
    client: &reqwest::Client,
    url: &str,
) -> Result<MetadataToken, AuthError> {
    let response = client
        .get(url)
        .header("Metadata-Flavor", "Google")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::Status {
            status: status.as_u16(),
            body,
        });
    }

    Ok(response.json::<MetadataToken>().await?)
}
