//! HTTP Server
//!
//! axum router with permissive CORS (the dashboard is served from another
//! origin), bound to the configured host and port.

pub mod routes;
pub mod types;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use suite_gateway_core::{CoreError, CoreResult};

use crate::state::AppState;

pub use types::{ApiError, ChatSuccess, ErrorDetail, ErrorEnvelope, HealthResponse, ProviderHealth};

/// Router with CORS applied.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    routes::router(state).layer(cors)
}

/// Bind and serve until the process exits.
pub async fn serve(state: AppState) -> CoreResult<()> {
    let bind_addr = state.config.bind_addr();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| CoreError::config(format!("failed to bind {}: {}", bind_addr, e)))?;
    let local_addr = listener.local_addr()?;

    info!("Suite gateway listening on http://{}", local_addr);
    info!("Health check: http://{}/health", local_addr);

    axum::serve(listener, app(state))
        .await
        .map_err(|e| CoreError::server(e.to_string()))
}
