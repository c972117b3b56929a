use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::config::Config;
use crate::error::{EdgeError, EdgeResult};
use crate::event::{EdgeEvent, evaluate_event};
use crate::metrics::Metrics;
use crate::origin::OriginForwarder;
use crate::rewrite::PrefixRewriter;

/// Response header reporting which branch of the rule fired
pub const REWRITE_OUTCOME_HEADER: &str = "x-rewrite-outcome";

pub struct AppState {
    pub rewriter: Arc<PrefixRewriter>,
    pub origin: Arc<OriginForwarder>,
    pub config: Arc<Config>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn from_config(config: Config) -> EdgeResult<Self> {
        config.validate()?;

        Ok(Self {
            rewriter: Arc::new(PrefixRewriter::new(&config.rewrite)),
            origin: Arc::new(OriginForwarder::new(config.origin.clone())?),
            config: Arc::new(config),
            metrics: Arc::new(Metrics::new()),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub rewrite_enabled: bool,
    pub prefix: String,
    pub fallback_path: String,
}

// Edge liveness endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        rewrite_enabled: state.rewriter.is_enabled(),
        prefix: state.rewriter.prefix().to_string(),
        fallback_path: state.rewriter.fallback_path().to_string(),
    })
}

// Metrics endpoint (Prometheus format)
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let metrics = state.metrics.gather();
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics,
    )
}

// Evaluate the rule against a viewer-request event without forwarding
pub async fn rewrite_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<EdgeEvent>,
) -> impl IntoResponse {
    let (request, outcome) = evaluate_event(&state.rewriter, event);
    debug!(uri = %request.uri, outcome = outcome.as_str(), "Evaluated edge event");

    ([(REWRITE_OUTCOME_HEADER, outcome.as_str())], Json(request))
}

// Forward everything else to the origin
pub async fn forward_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, EdgeError> {
    let (parts, body) = request.into_parts();

    let body = axum::body::to_bytes(body, state.config.server.max_body_bytes)
        .await
        .map_err(|e| EdgeError::InvalidRequest(format!("Failed to read request body: {}", e)))?;

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let start = Instant::now();
    let result = state
        .origin
        .forward(&parts.method, path_and_query, &parts.headers, body)
        .await;
    let elapsed = start.elapsed();

    match result {
        Ok(origin_response) => {
            state
                .metrics
                .record_origin_request(Some(origin_response.status), elapsed);

            let mut response = Response::new(Body::from(origin_response.body));
            *response.status_mut() = origin_response.status;
            *response.headers_mut() = origin_response.headers;
            Ok(response)
        }
        Err(e) => {
            state.metrics.record_origin_request(None, elapsed);
            Err(e)
        }
    }
}
