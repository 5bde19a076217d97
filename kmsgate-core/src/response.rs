//! JSON response writing shared by every route

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::ApiError;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Success body: one string payload (ciphertext, cleartext or resource name)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadResponse {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub payload: String,
}

impl PayloadResponse {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

/// Serialize `body` with the service content type
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => with_json_body(status, Body::from(bytes)),
        Err(e) => {
            error!(error = %e, "Failed to encode response body");
            with_json_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                Body::from(r#"{"status_code":500,"message":"response encoding failed"}"#),
            )
        }
    }
}

/// Turn a handler outcome into either a payload or an error envelope
pub fn respond(result: Result<String, ApiError>) -> Response {
    match result {
        Ok(payload) => json_response(StatusCode::OK, &PayloadResponse::new(payload)),
        Err(err) => err.into_response(),
    }
}

/// Liveness body, independent of any provider
pub fn health() -> Response {
    json_response(StatusCode::OK, &serde_json::json!({ "ok": true }))
}

fn with_json_body(status: StatusCode, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(JSON_CONTENT_TYPE),
    );
    response
}
