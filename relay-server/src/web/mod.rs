//! Web server module for the relay.
//!
//! Routes:
//! - `POST /zendesk-webhook`: authenticate, forward once, report the outcome
//! - `GET /test-connection`: connectivity probes against the forward target
//! - `GET /debug-ip`: caller address and proxy headers
//! - `GET /health`: liveness, never authenticated
//!
//! Diagnostics share the webhook's credential check unless
//! `DIAGNOSTICS_REQUIRE_AUTH` is turned off.

pub mod auth;
pub mod handlers;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use auth::{AuthDecision, AuthGate, RejectReason, Rejection};
pub use handlers::{debug_ip, health, relay_webhook, test_connection, AppState, HealthResponse};

pub const WEBHOOK_PATH: &str = "/zendesk-webhook";

/// Build the full router for `state`.
pub fn router(state: AppState) -> Router {
    let relay = Router::new()
        .route(WEBHOOK_PATH, post(relay_webhook))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let diagnostics = Router::new()
        .route("/test-connection", get(test_connection))
        .route("/debug-ip", get(debug_ip));

    let diagnostics = if state.config.diagnostics_require_auth {
        diagnostics.route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
    } else {
        diagnostics
    };

    Router::new()
        .route("/health", get(health))
        .merge(relay)
        .merge(diagnostics)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Reject the request before it reaches the handler unless its credentials
/// pass the configured [`AuthGate`].
pub async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match state.auth.check(request.headers()) {
        AuthDecision::Authorized => next.run(request).await,
        AuthDecision::Rejected(rejection) => {
            warn!(
                path = %request.uri().path(),
                auth_mode = state.auth.mode_name(),
                reason = rejection.reason.as_str(),
                status_code = rejection.status.as_u16(),
                "auth_rejected"
            );
            rejection.into_response()
        }
    }
}
