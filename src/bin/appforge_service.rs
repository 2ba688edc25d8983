//! Pipeline Service Binary
//!
//! Runs the change-application pipeline as a REST API service:
//! - Structured JSON logging
//! - Request tracing with correlation IDs
//! - Graceful shutdown handling
//! - Health check endpoint
//!
//! The model-hosting platform transport is out of scope for this crate, so
//! the binary wires the in-memory platform backend (seeded from an optional
//! JSON fixture) against a filesystem artifact store. It is a local
//! end-to-end harness; production deployments supply their own
//! `ModelBackend` implementation.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `ARTIFACT_ROOT`: directory backing the artifact store (default: ./artifacts)
//! - `APP_FIXTURE`: path to a JSON fixture seeding the model backend (optional)
//! - `PORT`: Service port (default: 8002)
//! - `HOST`: Service host (default: 0.0.0.0)
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Usage
//!
//! ```bash
//! ARTIFACT_ROOT=/var/artifacts APP_FIXTURE=apps.json cargo run --bin appforge_service --features service
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, Instrument};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use appforge::service::{create_router, ServiceState};
use appforge::{FsArtifactStore, ImageCollection, InMemoryModelBackend};

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "appforge_service=info,appforge=info,tower_http=info".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_span_events(FmtSpan::CLOSE))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true),
            )
            .init();
    }
}

/// Request logging middleware that adds correlation ID and timing
async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let trace_id = request
        .headers()
        .get("X-Request-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let method = request.method().clone();
    let uri = request.uri().path().to_string();

    let span = info_span!(
        "request",
        trace_id = %trace_id,
        method = %method,
        path = %uri,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );

    let response = next.run(request).instrument(span.clone()).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    span.record("status", status);
    span.record("latency_ms", latency.as_millis() as u64);

    info!(
        target: "appforge_service::access",
        trace_id = %trace_id,
        method = %method,
        path = %uri,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request completed"
    );

    response
}

/// One seeded app in the fixture file.
#[derive(Debug, Deserialize)]
struct AppFixture {
    app_id: String,
    #[serde(default)]
    files: BTreeMap<String, String>,
    #[serde(default)]
    collections: Vec<ImageCollection>,
}

/// Fixture file shape: a list of app templates.
#[derive(Debug, Deserialize)]
struct Fixture {
    apps: Vec<AppFixture>,
}

fn load_fixture(backend: &InMemoryModelBackend, path: &str) -> Result<usize, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let fixture: Fixture = serde_json::from_str(&raw)?;

    let count = fixture.apps.len();
    for app in fixture.apps {
        backend.add_app(&app.app_id);
        for (location, content) in app.files {
            backend.add_template_file(&app.app_id, &location, content.into_bytes());
        }
        for collection in app.collections {
            backend.add_template_collection(&app.app_id, collection);
        }
    }
    Ok(count)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let version = env!("CARGO_PKG_VERSION");
    info!(version = version, "Starting Pipeline Service");

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8002);
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

    let artifact_root =
        std::env::var("ARTIFACT_ROOT").unwrap_or_else(|_| "./artifacts".to_string());
    let store = Arc::new(FsArtifactStore::new(&artifact_root));
    info!(artifact_root = %artifact_root, "artifact store ready");

    let backend = Arc::new(InMemoryModelBackend::new());
    if let Ok(fixture_path) = std::env::var("APP_FIXTURE") {
        match load_fixture(&backend, &fixture_path) {
            Ok(count) => info!(fixture = %fixture_path, apps = count, "model fixture loaded"),
            Err(e) => {
                tracing::error!(fixture = %fixture_path, error = %e, "failed to load model fixture");
                return Err(e);
            }
        }
    } else {
        tracing::warn!("APP_FIXTURE not set; pipeline runs will fail to open any app");
    }

    let state = ServiceState::new(backend, store);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!(address = %addr, version = version, "Pipeline Service listening");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
            _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Pipeline Service shutdown complete");

    Ok(())
}
