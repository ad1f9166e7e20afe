use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Build the application router with all routes
pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::healthcheck))
        .route("/api/seed", post(handlers::topologies::seed_inventory))
        // Topology routes
        .route("/api/topologies", get(handlers::topologies::list_topologies))
        .route("/api/topologies/:name/generate", post(handlers::topologies::generate_topology))
        .route("/api/topologies/:name/check", get(handlers::topologies::check_topology))
        // Device routes
        .route("/api/devices", get(handlers::devices::list_devices))
        .route("/api/devices/:name/interfaces", get(handlers::devices::list_device_interfaces))
        .route("/api/bgp-sessions", get(handlers::devices::list_bgp_sessions))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
