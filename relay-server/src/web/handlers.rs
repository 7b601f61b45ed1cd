//! Endpoint handlers.
//!
//! Authentication has already happened in [`require_auth`](super::require_auth)
//! by the time the relay and diagnostics handlers run.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::diagnostics::{CallerIdentity, DiagnosticReport, Prober};
use crate::forward::{Forwarder, RelayError};
use crate::web::auth::AuthGate;
use crate::Config;

/// Shared application state. Everything in it is immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<AuthGate>,
    pub forwarder: Forwarder,
    pub prober: Prober,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let forwarder = Forwarder::new(config.forward_url.clone(), config.forward_timeout)?;
        let prober = Prober::new(config.forward_url.clone(), config.probe_timeout)?;

        Ok(Self {
            auth: Arc::new(AuthGate::new(config.auth.clone())),
            config: Arc::new(config),
            forwarder,
            prober,
        })
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Zendesk Webhook
// =============================================================================

/// Zendesk webhook endpoint.
///
/// The body is parsed only to confirm it is JSON, then forwarded as-is with
/// key order preserved. One downstream attempt, no retry.
pub async fn relay_webhook(State(state): State<AppState>, body: Bytes) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!(body_length = body.len(), error = %e, "webhook_invalid_json");
            return (
                StatusCode::BAD_REQUEST,
                Json(RelayError {
                    error: "invalid json",
                    details: e.to_string(),
                    status_code: None,
                    kind: None,
                }),
            )
                .into_response();
        }
    };

    info!(
        body_length = body.len(),
        target_host = ?state.forwarder.target().host_str(),
        "webhook_received"
    );

    state.forwarder.forward(&payload).await.into_response()
}

// =============================================================================
// Diagnostics
// =============================================================================

/// Probe DNS, TCP and HTTP reachability of the forward target.
pub async fn test_connection(State(state): State<AppState>) -> Json<DiagnosticReport> {
    info!(target_host = ?state.forwarder.target().host_str(), "connectivity_probe_requested");
    Json(state.prober.run().await)
}

/// Report the caller's address and proxy headers.
pub async fn debug_ip(
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Json<CallerIdentity> {
    let remote = connect_info.map(|ConnectInfo(addr)| addr);
    let identity = CallerIdentity::observe(remote, &headers);

    info!(
        client_ip = ?identity.client_ip,
        x_forwarded_for = ?identity.x_forwarded_for,
        x_real_ip = ?identity.x_real_ip,
        "debug_ip_requested"
    );

    Json(identity)
}
