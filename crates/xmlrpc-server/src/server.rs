//! HTTP server implementation using Axum.

use crate::handler::{handle_health, handle_rpc};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use xmlrpc_core::{EndpointConfig, MethodRegistry};

/// Application state shared across handlers.
pub struct AppState {
    /// Method table, frozen before the first request is accepted
    pub registry: MethodRegistry,
}

/// Build the router: XML-RPC on every path in `EndpointConfig::RPC_PATHS`
/// plus a JSON `/health` check.
pub fn build_router(registry: MethodRegistry) -> Router {
    let state = Arc::new(AppState { registry });

    let mut router: Router<Arc<AppState>> = Router::new().route("/health", get(handle_health));
    for path in EndpointConfig::RPC_PATHS {
        router = router.route(path, post(handle_rpc));
    }

    router
        .layer(DefaultBodyLimit::max(EndpointConfig::MAX_REQUEST_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the XML-RPC HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(
    registry: MethodRegistry,
    host: IpAddr,
    port: u16,
) -> anyhow::Result<SocketAddr> {
    let app = build_router(registry);

    let listener = tokio::net::TcpListener::bind(SocketAddr::new(host, port)).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    // Spawn the server in the background
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}
