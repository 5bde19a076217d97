//! Handler-boundary errors and the JSON error envelope

use axum::{
    extract::rejection::{BytesRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::response::json_response;

/// Any failure a handler can run into.
///
/// Every variant is reported the same way: HTTP 500 with an
/// [`ErrorEnvelope`] whose message is the error text. Client mistakes (bad
/// JSON, bad base64) are not told apart from provider failures.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body could not be read
    #[error("{0}")]
    BodyRead(#[from] BytesRejection),

    /// A path segment could not be extracted
    #[error("{0}")]
    Path(#[from] PathRejection),

    /// The request body was not the expected JSON document
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// A key or secret service call failed
    #[error("{0}")]
    Upstream(String),
}

impl ApiError {
    pub fn upstream(err: impl std::fmt::Display) -> Self {
        Self::Upstream(err.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            status_code: self.status_code().as_u16(),
            message: self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(error = %self, "Request failed");
        json_response(self.status_code(), &self.envelope())
    }
}

/// JSON body of every error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}
