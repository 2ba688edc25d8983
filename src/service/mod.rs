//! Pipeline REST service.
//!
//! Exposes the change-application pipeline over HTTP.
//!
//! ## Endpoints
//!
//! - `POST /pipeline/run` - Run one pipeline request to completion
//! - `GET /healthz` - Liveness probe

pub mod routes;
pub mod state;

pub use routes::{create_router, HealthResponse, PipelineResponse};
pub use state::ServiceState;
