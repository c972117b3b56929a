use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::edge::rewrite_middleware;
use crate::handlers::{AppState, forward_handler, health, metrics, rewrite_event};
use crate::middleware::request_id_layer;

/// Build the edge router.
///
/// `/_edge/*` is served locally. Everything else goes through the rewrite
/// middleware and is forwarded to the origin.
pub fn build_app(state: Arc<AppState>) -> Router {
    // Local endpoints, never rewritten or forwarded
    let edge_routes = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/rewrite", post(rewrite_event));

    let forward_routes = Router::new()
        .fallback(forward_handler)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rewrite_middleware,
        ));

    Router::new()
        .nest("/_edge", edge_routes)
        .merge(forward_routes)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_layer))
                .layer(TraceLayer::new_for_http()),
        )
        .with_state(state)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
