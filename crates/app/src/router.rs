use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Value};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::pipeline::SubmissionPipeline;
use crate::{contact, security, telemetry};

/// Largest request body accepted. A message at its character cap written with
/// JSON surrogate-pair escapes takes twelve bytes per character, so this must
/// stay above that worst case.
const MAX_BODY_BYTES: usize = 256 * 1024;

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    pipeline: SubmissionPipeline,
    cors_origins: Arc<[HeaderValue]>,
}

impl AppState {
    pub fn new(
        metrics: PrometheusHandle,
        pipeline: SubmissionPipeline,
        cors_origins: Vec<HeaderValue>,
    ) -> Self {
        Self {
            metrics,
            pipeline,
            cors_origins: cors_origins.into(),
        }
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn pipeline(&self) -> &SubmissionPipeline {
        &self.pipeline
    }

    pub fn cors_origins(&self) -> &[HeaderValue] {
        &self.cors_origins
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = security::cors_layer(state.cors_origins());

    // Contact responses may echo what the visitor typed.
    let api = Router::new()
        .route("/contact", post(contact::submit))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    let router = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
        .layer(cors);

    security::apply_security_headers(router)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}
