// src/api/handlers.rs — HTTP handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::api::types::{ErrorResponse, HealthResponse};
use crate::api::AppState;
use crate::core::types::BuildRequest;
use crate::infra::errors::KitForgeError;

/// Header set to "true" when the plan came from the template fallback
/// instead of the AI planner.
pub const FALLBACK_PLAN_HEADER: &str = "x-kitforge-fallback-plan";

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

pub async fn build(
    State(state): State<AppState>,
    payload: Result<Json<BuildRequest>, JsonRejection>,
) -> Response {
    // Schema violations get the same 400 shape as semantic ones, not
    // axum's default rejection body.
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            tracing::warn!("Rejected malformed build body: {}", rejection);
            return validation_error().into_response();
        }
    };

    if let Err(e) = request.validate() {
        tracing::warn!("Rejected build request: {}", e);
        return validation_error().into_response();
    }

    match state.orchestrator.run(&request).await {
        Ok(result) => {
            let mut headers = HeaderMap::new();
            if result.fallback_plan {
                headers.insert(FALLBACK_PLAN_HEADER, HeaderValue::from_static("true"));
            }
            (StatusCode::OK, headers, Json(result)).into_response()
        }
        Err(e) => {
            tracing::error!(query = %request.query, "Build failed: {}", e);
            let (status, kind) = error_status(&e);
            (status, Json(ErrorResponse::new(e.to_string(), kind))).into_response()
        }
    }
}

fn validation_error() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new("Invalid request data", "VALIDATION_ERROR")),
    )
}

/// Map a pipeline error to its response status and error kind.
///
/// The "configuration" arm covers deployments that construct collaborators
/// lazily; `cli::run_serve` resolves credentials before binding the
/// listener, so its server fails fast at startup rather than per request.
fn error_status(e: &KitForgeError) -> (StatusCode, &'static str) {
    match e {
        KitForgeError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        e if e.is_fatal() => (StatusCode::INTERNAL_SERVER_ERROR, "configuration"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}
