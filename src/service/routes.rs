//! Axum routes for the pipeline service.

use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::platform::ModelBackend;
use crate::store::ArtifactStore;
use crate::types::PipelineRequest;

use super::state::ServiceState;

/// Wire response: echoes the HTTP status in the body, per the external
/// contract. `body` is the uploaded artifact key on success and a
/// stage-identifying error message on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResponse {
    /// 200 on success, 500 on any failure.
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// Artifact key or error message.
    pub body: String,
}

impl PipelineResponse {
    /// Success response carrying the uploaded artifact key.
    pub fn ok(artifact_key: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            body: artifact_key.into(),
        }
    }

    /// Failure response carrying a human-readable error message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status_code: 500,
            body: message.into(),
        }
    }
}

/// Service health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the service can answer.
    pub status: String,
    /// Crate version.
    pub version: String,
}

/// Run one pipeline request to completion or first failure.
async fn run_pipeline_handler<B, S>(
    State(state): State<ServiceState<B, S>>,
    Json(request): Json<PipelineRequest>,
) -> (StatusCode, Json<PipelineResponse>)
where
    B: ModelBackend + 'static,
    S: ArtifactStore + 'static,
{
    match state.orchestrator().run(&request).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(PipelineResponse::ok(outcome.artifact_key)),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(PipelineResponse::failure(e.to_string())),
        ),
    }
}

/// Liveness check.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Build the service router.
pub fn create_router<B, S>(state: ServiceState<B, S>) -> Router
where
    B: ModelBackend + 'static,
    S: ArtifactStore + 'static,
{
    Router::new()
        .route("/pipeline/run", post(run_pipeline_handler::<B, S>))
        .route("/healthz", get(health_handler))
        .with_state(state)
}
