//! XML-RPC request handlers.

use crate::server::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, warn};
use xmlrpc_core::codec::{write_fault, CONTENT_TYPE};
use xmlrpc_core::{Fault, MethodCall, MethodRegistry, MethodResponse};

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Main XML-RPC handler.
///
/// Always answers HTTP 200; failures travel as `<fault>` documents.
pub async fn handle_rpc(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let response = process_request(&state.registry, &body);

    let xml = match response.to_xml() {
        Ok(xml) => xml,
        Err(e) => {
            error!("Failed to encode response: {}", e);
            write_fault(&e.to_fault())
        }
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, CONTENT_TYPE)],
        xml,
    )
}

/// Decode one request body, dispatch it and produce the response.
pub fn process_request(registry: &MethodRegistry, body: &[u8]) -> MethodResponse {
    let xml = match std::str::from_utf8(body) {
        Ok(xml) => xml,
        Err(e) => {
            warn!("Request body is not UTF-8: {}", e);
            return MethodResponse::Fault(Fault::new(
                -32700,
                format!("request is not valid UTF-8: {}", e),
            ));
        }
    };

    let call = match MethodCall::from_xml(xml) {
        Ok(call) => call,
        Err(e) => {
            warn!("Malformed XML-RPC request: {}", e);
            return MethodResponse::Fault(e.to_fault());
        }
    };

    debug!("RPC call: {}({:?})", call.method_name, call.params);

    match registry.dispatch(&call.method_name, &call.params) {
        Ok(value) => MethodResponse::Success(value),
        Err(e) => {
            warn!("RPC error for {}: {}", call.method_name, e);
            MethodResponse::Fault(e.to_fault())
        }
    }
}
