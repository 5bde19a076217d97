//! HTTP router for kmsgate

use axum::{
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    response::{IntoResponse, Response},
    routing::get,
    BoxError, Router,
};
use kmsgate_core::ApiError;
use std::sync::Arc;
use std::time::Duration;
use tower::{timeout::error::Elapsed, timeout::TimeoutLayer, ServiceBuilder};
use tower_http::trace::TraceLayer;

use kmsgate_kms::KmsState;
use kmsgate_secrets::SecretsState;

/// Matches the server read/write timeout the service has always run with
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Request bodies above this size fail with the error envelope
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Create the main application router
pub fn create_router(kms: Arc<KmsState>, secrets: Arc<SecretsState>) -> Router {
    build_router(kms, secrets, REQUEST_TIMEOUT)
}

fn build_router(kms: Arc<KmsState>, secrets: Arc<SecretsState>, timeout: Duration) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .merge(kmsgate_kms::router(kms))
        .merge(kmsgate_secrets::router(secrets))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_layer_error))
                .layer(TimeoutLayer::new(timeout)),
        )
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> Response {
    kmsgate_core::health()
}

/// Failures raised by the middleware stack get the same envelope as handler errors
async fn handle_layer_error(err: BoxError) -> Response {
    if err.is::<Elapsed>() {
        return ApiError::upstream("request timed out").into_response();
    }
    ApiError::upstream(err).into_response()
}
