//! Prometheus /metrics + health check HTTP endpoints
//!
//! Endpoints:
//!   GET /metrics  Prometheus text format
//!   GET /healthz  Liveness probe (always 200 if process is running)
//!   GET /readyz   Readiness probe (200 if the backend is reachable)

use anyhow::Result;
use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus_client::{
    encoding::text::encode,
    metrics::{counter::Counter, family::Family, histogram::Histogram},
    registry::Registry,
};
use sealgate_core::line::ERROR_PREFIX;
use sealgate_gateway::wire::command_name;
use sealgate_gateway::Responder;
use sealgate_storage::Backend;
use std::sync::Arc;
use std::time::{Duration, Instant};

type Labels = Vec<(String, String)>;

/// Request counters and latency histograms, shared by every front end.
#[derive(Clone, Debug)]
pub struct RequestMetrics {
    requests: Family<Labels, Counter>,
    duration: Family<Labels, Histogram>,
}

impl RequestMetrics {
    pub fn new(registry: &mut Registry) -> Self {
        let requests = Family::default();
        let duration = Family::<Labels, Histogram>::new_with_constructor(|| {
            Histogram::new([0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0])
        });

        registry.register(
            "sealgate_requests",
            "Requests handled, by command and outcome",
            requests.clone(),
        );
        registry.register(
            "sealgate_request_duration_seconds",
            "Request handling duration in seconds",
            duration.clone(),
        );

        Self { requests, duration }
    }

    pub fn observe(&self, command: &str, ok: bool, elapsed: Duration) {
        let outcome = if ok { "ok" } else { "error" };
        self.requests
            .get_or_create(&vec![
                ("command".to_string(), command.to_string()),
                ("outcome".to_string(), outcome.to_string()),
            ])
            .inc();
        self.duration
            .get_or_create(&vec![("command".to_string(), command.to_string())])
            .observe(elapsed.as_secs_f64());
    }
}

/// Wraps a line responder and records every request it answers.
pub struct MeteredResponder {
    inner: Arc<dyn Responder>,
    metrics: RequestMetrics,
}

impl MeteredResponder {
    pub fn new(inner: Arc<dyn Responder>, metrics: RequestMetrics) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl Responder for MeteredResponder {
    async fn respond(&self, line: &str) -> String {
        let start = Instant::now();
        let response = self.inner.respond(line).await;
        self.metrics.observe(
            command_name(line),
            !response.starts_with(ERROR_PREFIX),
            start.elapsed(),
        );
        response
    }
}

/// Shared health state read by the probe handlers
#[derive(Clone)]
pub struct HealthState {
    pub registry: Arc<Registry>,
    pub backend: Arc<dyn Backend>,
}

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .with_state(state)
}

/// Serve Prometheus metrics and health endpoints on an already-bound listener
pub async fn serve(listener: tokio::net::TcpListener, state: HealthState) -> Result<()> {
    axum::serve(listener, router(state))
        .await
        .map_err(|e| anyhow::anyhow!("metrics server: {e}"))
}

async fn metrics_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let mut body = String::new();
    match encode(&mut body, &state.registry) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            tracing::error!("metrics encode failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.to_string(),
            )
        }
    }
}

/// Liveness probe: returns 200 if the process is running.
async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe: returns 200 if the backend answers, 503 otherwise.
async fn readyz_handler(State(state): State<HealthState>) -> impl IntoResponse {
    match sealgate_storage::check_health(state.backend.as_ref()).await {
        Ok(()) => (StatusCode::OK, "ready"),
        Err(e) => {
            tracing::warn!(backend = state.backend.kind(), error = %e, "readiness probe failed");
            (StatusCode::SERVICE_UNAVAILABLE, "backend unreachable")
        }
    }
}
