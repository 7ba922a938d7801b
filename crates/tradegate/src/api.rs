//! HTTP surface for the decision pipeline.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;
use tradegate_models::{Decision, DecisionRequest};
use tradegate_pipeline::{ErrorKind, Pipeline, PipelineError, PipelineStatus};

/// Application state shared across handlers.
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// API error carrying the HTTP status and a stable error kind.
#[derive(Debug)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: StatusCode,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::MalformedRequest,
            message: message.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let kind = err.kind();
        let status = match kind {
            ErrorKind::MalformedRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Exhausted
            | ErrorKind::CollaboratorUnavailable
            | ErrorKind::CollaboratorTimeout => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            kind,
            message: err.to_string(),
            status,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.kind.as_str().to_string(),
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "API error {} ({}): {}", self.status, self.kind, self.message)
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: i64,
    pub pipeline: PipelineStatus,
}

/// Create the REST API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ai/status", get(status))
        .route("/ai/decide", post(decide))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /
async fn root() -> Json<Value> {
    Json(json!({
        "service": "tradegate",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/ai/decide", "/ai/status", "/health"],
    }))
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
    }))
}

/// GET /ai/status
async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "operational",
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at,
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        pipeline: state.pipeline.status(),
    })
}

/// POST /ai/decide
async fn decide(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DecisionRequest>, JsonRejection>,
) -> Result<Json<Decision>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejected request body");
        ApiError::from(rejection)
    })?;

    let decision = crate::evaluate(&state.pipeline, request).await?;
    Ok(Json(decision))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let exhausted = ApiError::from(PipelineError::Exhausted);
        assert_eq!(exhausted.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(exhausted.kind, ErrorKind::Exhausted);

        let unavailable = ApiError::from(PipelineError::CollaboratorUnavailable("down".into()));
        assert_eq!(unavailable.status, StatusCode::SERVICE_UNAVAILABLE);

        let malformed = ApiError::from(PipelineError::from(
            tradegate_models::ValidationError::EmptySeries,
        ));
        assert_eq!(malformed.status, StatusCode::BAD_REQUEST);

        let internal = ApiError::from(PipelineError::Internal("bug".into()));
        assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
