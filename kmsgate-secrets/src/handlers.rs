//! HTTP handlers for the secret routes

use axum::{
    extract::{
        rejection::{BytesRejection, PathRejection},
        Path, Query, State,
    },
    response::Response,
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use kmsgate_core::{respond, ApiError, ResourceNames};
use kmsgate_kms::KeyService;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::service::SecretService;

/// Shared state for secret handlers
pub struct SecretsState {
    pub secrets: Arc<SecretService>,
    pub keys: Arc<KeyService>,
    pub names: Arc<ResourceNames>,
}

/// Routes served by this crate
pub fn router(state: Arc<SecretsState>) -> Router {
    Router::new()
        .route("/secrets", post(handle_create_secret))
        .route("/secrets/:secret_name/:version", get(handle_retrieve_secret))
        .route("/storesecrets", post(handle_store_secret))
        .with_state(state)
}

// === Request types ===

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CreateSecretRequest {
    secret_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoreSecretRequest {
    secret_id: String,
    payload: String,
    encrypted: bool,
}

// === Handlers ===

/// GET /secrets/:secret_name/:version?encrypted=true
pub async fn handle_retrieve_secret(
    State(state): State<Arc<SecretsState>>,
    path: Result<Path<(String, String)>, PathRejection>,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    // first occurrence wins; only the literal "true" turns decryption on
    let encrypted = query
        .iter()
        .find(|(key, _)| key == "encrypted")
        .is_some_and(|(_, value)| value == "true");
    respond(retrieve_secret(&state, path, encrypted).await)
}

/// POST /secrets
pub async fn handle_create_secret(
    State(state): State<Arc<SecretsState>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    respond(create_secret(&state, body).await)
}

/// POST /storesecrets
pub async fn handle_store_secret(
    State(state): State<Arc<SecretsState>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    respond(store_secret(&state, body).await)
}

async fn retrieve_secret(
    state: &SecretsState,
    path: Result<Path<(String, String)>, PathRejection>,
    encrypted: bool,
) -> Result<String, ApiError> {
    let Path((secret_name, version)) = path?;
    let name = state.names.secret_version(&secret_name, &version);
    info!(secret = %name, encrypted, "Retrieving secret");

    let secret = state.secrets.get_secret_version(&name).await?;
    if !encrypted {
        return Ok(String::from_utf8_lossy(&secret).into_owned());
    }

    let cleartext = state.keys.decrypt(state.names.symmetric_key(), &secret).await?;
    Ok(String::from_utf8_lossy(&cleartext).into_owned())
}

async fn create_secret(
    state: &SecretsState,
    body: Result<Bytes, BytesRejection>,
) -> Result<String, ApiError> {
    let req: CreateSecretRequest = serde_json::from_slice(&body?)?;
    info!(secret_id = %req.secret_id, "Creating secret");

    Ok(state
        .secrets
        .create_secret(state.names.parent(), &req.secret_id)
        .await?)
}

async fn store_secret(
    state: &SecretsState,
    body: Result<Bytes, BytesRejection>,
) -> Result<String, ApiError> {
    let req: StoreSecretRequest = serde_json::from_slice(&body?)?;
    let parent = state.names.secret(&req.secret_id);
    info!(secret = %parent, encrypted = req.encrypted, "Storing secret");

    let payload = if req.encrypted {
        state
            .keys
            .encrypt(state.names.symmetric_key(), req.payload.as_bytes())
            .await?
    } else {
        req.payload
    };

    Ok(state
        .secrets
        .add_secret_version(&parent, payload.as_bytes())
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SecretManager;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use kmsgate_core::{ProviderError, JSON_CONTENT_TYPE};
    use kmsgate_kms::KeyManagement;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tower::ServiceExt;

    type CallLog = Arc<Mutex<Vec<String>>>;

    /// Reverses bytes for "encryption"; logs every call
    struct RecordingKms {
        log: CallLog,
    }

    #[async_trait]
    impl KeyManagement for RecordingKms {
        async fn encrypt(&self, name: &str, plaintext: &[u8]) -> Result<Vec<u8>, ProviderError> {
            self.log.lock().unwrap().push(format!("kms.encrypt {}", name));
            Ok(plaintext.iter().rev().copied().collect())
        }

        async fn decrypt(&self, name: &str, ciphertext: &[u8]) -> Result<Vec<u8>, ProviderError> {
            self.log.lock().unwrap().push(format!("kms.decrypt {}", name));
            Ok(ciphertext.iter().rev().copied().collect())
        }

        async fn get_public_key(&self, _name: &str) -> Result<String, ProviderError> {
            unreachable!()
        }

        async fn asymmetric_decrypt(
            &self,
            _name: &str,
            _ciphertext: &[u8],
        ) -> Result<Vec<u8>, ProviderError> {
            unreachable!()
        }
    }

    /// In-memory secrets keyed by version name; logs every call
    struct RecordingSecrets {
        log: CallLog,
        versions: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl SecretManager for RecordingSecrets {
        async fn access_secret_version(&self, name: &str) -> Result<Vec<u8>, ProviderError> {
            self.log.lock().unwrap().push(format!("sm.access {}", name));
            self.versions
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .ok_or_else(|| ProviderError::Status {
                    status: 404,
                    body: format!("Secret [{}] not found", name),
                })
        }

        async fn create_secret(&self, parent: &str, secret_id: &str) -> Result<String, ProviderError> {
            self.log.lock().unwrap().push(format!("sm.create {} {}", parent, secret_id));
            Ok(format!("{}/secrets/{}", parent, secret_id))
        }

        async fn add_secret_version(&self, parent: &str, payload: &[u8]) -> Result<String, ProviderError> {
            self.log.lock().unwrap().push(format!("sm.add {}", parent));
            let name = format!("{}/versions/1", parent);
            self.versions.lock().unwrap().insert(name.clone(), payload.to_vec());
            Ok(name)
        }
    }

    const SYM_KEY: &str = "projects/p/locations/global/keyRings/ring/cryptoKeys/sym";

    struct Harness {
        app: Router,
        log: CallLog,
        secrets: Arc<RecordingSecrets>,
    }

    fn harness() -> Harness {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let secrets = Arc::new(RecordingSecrets {
            log: log.clone(),
            versions: Mutex::new(HashMap::new()),
        });
        let state = Arc::new(SecretsState {
            secrets: Arc::new(SecretService::new(secrets.clone())),
            keys: Arc::new(KeyService::new(Arc::new(RecordingKms { log: log.clone() }))),
            names: Arc::new(ResourceNames::new("p", "global", "ring", "sym")),
        });
        Harness {
            app: router(state),
            log,
            secrets,
        }
    }

    impl Harness {
        fn seed(&self, name: &str, payload: &[u8]) {
            self.secrets
                .versions
                .lock()
                .unwrap()
                .insert(name.to_string(), payload.to_vec());
        }

        fn calls(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            (status, serde_json::from_slice(&bytes).unwrap())
        }

        async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
            self.send(Request::get(uri).body(Body::empty()).unwrap()).await
        }

        async fn post(&self, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
            self.send(Request::post(uri).body(Body::from(body.to_string())).unwrap())
                .await
        }
    }

    #[tokio::test]
    async fn test_retrieve_plain_secret() {
        let h = harness();
        h.seed("projects/p/secrets/db/versions/3", b"s3cret");

        let (status, body) = h.get("/secrets/db/3").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"payload": "s3cret"}));
        assert_eq!(h.calls(), vec!["sm.access projects/p/secrets/db/versions/3"]);
    }

    #[tokio::test]
    async fn test_retrieve_encrypted_secret_decrypts_after_access() {
        let h = harness();
        // base64 of the reversed bytes "terces"
        h.seed("projects/p/secrets/db/versions/latest", b"dGVyY2Vz");

        let (status, body) = h.get("/secrets/db/latest?encrypted=true").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"payload": "secret"}));
        assert_eq!(
            h.calls(),
            vec![
                "sm.access projects/p/secrets/db/versions/latest".to_string(),
                format!("kms.decrypt {}", SYM_KEY),
            ]
        );
    }

    #[tokio::test]
    async fn test_retrieve_skips_decrypt_unless_literal_true() {
        let h = harness();
        h.seed("projects/p/secrets/db/versions/1", b"dGVyY2Vz");

        for uri in ["/secrets/db/1?encrypted=TRUE", "/secrets/db/1?encrypted=1", "/secrets/db/1"] {
            let (status, body) = h.get(uri).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, serde_json::json!({"payload": "dGVyY2Vz"}));
        }
        assert!(h.calls().iter().all(|c| c.starts_with("sm.access")));
    }

    #[tokio::test]
    async fn test_retrieve_missing_secret() {
        let h = harness();

        let (status, body) = h.get("/secrets/missing/1").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            serde_json::json!({
                "status_code": 500,
                "message": "access error: 404 Secret [projects/p/secrets/missing/versions/1] not found"
            })
        );
    }

    #[tokio::test]
    async fn test_retrieve_encrypted_secret_with_bad_ciphertext() {
        let h = harness();
        h.seed("projects/p/secrets/db/versions/1", b"plain text, not base64");

        let (status, body) = h.get("/secrets/db/1?encrypted=true").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["message"].as_str().unwrap().starts_with("decode: "));
    }

    #[tokio::test]
    async fn test_create_secret() {
        let h = harness();

        let (status, body) = h.post("/secrets", r#"{"secretId": "api-key"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"payload": "projects/p/secrets/api-key"}));
        assert_eq!(h.calls(), vec!["sm.create projects/p api-key"]);
    }

    #[tokio::test]
    async fn test_create_secret_bad_json() {
        let h = harness();

        let (status, body) = h.post("/secrets", "{not json").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status_code"], 500);
        assert!(!body["message"].as_str().unwrap().is_empty());
        assert!(h.calls().is_empty());
    }

    #[tokio::test]
    async fn test_store_secret_encrypted_encrypts_then_adds() {
        let h = harness();

        let (status, body) = h
            .post(
                "/storesecrets",
                r#"{"secretId": "db", "payload": "secret", "encrypted": true}"#,
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"payload": "projects/p/secrets/db/versions/1"}));
        assert_eq!(
            h.calls(),
            vec![format!("kms.encrypt {}", SYM_KEY), "sm.add projects/p/secrets/db".to_string()]
        );

        // stored value is the base64 ciphertext
        let stored = h.secrets.versions.lock().unwrap()["projects/p/secrets/db/versions/1"].clone();
        assert_eq!(stored, b"dGVyY2Vz");
    }

    #[tokio::test]
    async fn test_store_secret_plain_only_adds() {
        let h = harness();

        let (status, _) = h
            .post("/storesecrets", r#"{"secretId": "db", "payload": "secret"}"#)
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(h.calls(), vec!["sm.add projects/p/secrets/db"]);
        let stored = h.secrets.versions.lock().unwrap()["projects/p/secrets/db/versions/1"].clone();
        assert_eq!(stored, b"secret");
    }

    #[tokio::test]
    async fn test_store_then_retrieve_encrypted() {
        let h = harness();

        h.post(
            "/storesecrets",
            r#"{"secretId": "token", "payload": "abc123", "encrypted": true}"#,
        )
        .await;
        let (status, body) = h.get("/secrets/token/1?encrypted=true").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"payload": "abc123"}));
    }

    #[tokio::test]
    async fn test_store_secret_bad_json() {
        let h = harness();

        let (status, body) = h.post("/storesecrets", r#"{"encrypted": "yes"}"#).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status_code"], 500);
        assert!(h.calls().is_empty());
    }

    #[tokio::test]
    async fn test_first_encrypted_flag_wins() {
        let h = harness();
        h.seed("projects/p/secrets/db/versions/1", b"dGVyY2Vz");

        let (_, body) = h.get("/secrets/db/1?encrypted=true&encrypted=false").await;
        assert_eq!(body, serde_json::json!({"payload": "secret"}));

        let (_, body) = h.get("/secrets/db/1?encrypted=false&encrypted=true").await;
        assert_eq!(body, serde_json::json!({"payload": "dGVyY2Vz"}));
    }

    #[tokio::test]
    async fn test_undecodable_path_segment() {
        let h = harness();

        let response = h
            .app
            .clone()
            .oneshot(Request::get("/secrets/%FF/1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            JSON_CONTENT_TYPE
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status_code"], 500);
        assert!(body["message"].as_str().unwrap().contains("secret_name"));
        assert!(h.calls().is_empty());
    }
}
