//! Classification of a single forward attempt and its caller-visible mapping.

use std::error::Error as _;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Result of one outbound POST to the downstream endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Downstream answered with a status below 400.
    Success { status: u16, body: String },
    /// Downstream answered with 400 or above.
    UpstreamError { status: u16, body: String },
    /// The attempt hit the configured timeout.
    ConnectTimeout(String),
    /// DNS failure, refused connection, TLS handshake failure.
    ConnectFailure(String),
    /// Anything else, tagged with a failure class for triage.
    UnexpectedFailure { class: &'static str, reason: String },
}

impl ForwardOutcome {
    /// Classify a downstream response.
    pub fn from_response(status: u16, body: String) -> Self {
        if status < 400 {
            ForwardOutcome::Success { status, body }
        } else {
            ForwardOutcome::UpstreamError { status, body }
        }
    }

    /// Classify a failed request or body read.
    pub fn from_error(err: &reqwest::Error) -> Self {
        let reason = error_chain(err);

        if err.is_timeout() {
            ForwardOutcome::ConnectTimeout(reason)
        } else if err.is_connect() {
            ForwardOutcome::ConnectFailure(reason)
        } else {
            ForwardOutcome::UnexpectedFailure {
                class: failure_class(err),
                reason,
            }
        }
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardOutcome::Success { .. } => "success",
            ForwardOutcome::UpstreamError { .. } => "upstream_error",
            ForwardOutcome::ConnectTimeout(_) => "timeout_error",
            ForwardOutcome::ConnectFailure(_) => "connection_error",
            ForwardOutcome::UnexpectedFailure { class, .. } => *class,
        }
    }

    /// Downstream status, when a response was received at all.
    pub fn downstream_status(&self) -> Option<u16> {
        match self {
            ForwardOutcome::Success { status, .. }
            | ForwardOutcome::UpstreamError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Status code returned to the webhook caller.
    pub fn caller_status(&self) -> StatusCode {
        match self {
            ForwardOutcome::Success { .. } => StatusCode::OK,
            ForwardOutcome::ConnectTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Failure class of an error that is neither a timeout nor a connect error.
pub fn failure_class(err: &reqwest::Error) -> &'static str {
    if err.is_builder() {
        "builder_error"
    } else if err.is_redirect() {
        "redirect_error"
    } else if err.is_decode() {
        "decode_error"
    } else if err.is_body() {
        "body_error"
    } else if err.is_request() {
        "request_error"
    } else {
        "unknown_error"
    }
}

/// Render an error with all of its sources, e.g.
/// `error sending request: client error (Connect): tcp connect error: Connection refused`.
pub fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Body returned when the payload reached downstream successfully.
#[derive(Debug, Serialize)]
pub struct RelayOk {
    pub status: &'static str,
}

/// Body returned for every failed relay.
#[derive(Debug, Serialize)]
pub struct RelayError {
    pub error: &'static str,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
}

impl IntoResponse for ForwardOutcome {
    fn into_response(self) -> Response {
        let caller_status = self.caller_status();

        let error = match self {
            ForwardOutcome::Success { .. } => {
                return (caller_status, Json(RelayOk { status: "ok" })).into_response();
            }
            ForwardOutcome::UpstreamError { status, body } => RelayError {
                error: "relay failed",
                details: body,
                status_code: Some(status),
                kind: None,
            },
            ForwardOutcome::ConnectTimeout(reason) => RelayError {
                error: "connection timeout",
                details: reason,
                status_code: None,
                kind: Some("timeout_error"),
            },
            ForwardOutcome::ConnectFailure(reason) => RelayError {
                error: "failed to connect",
                details: reason,
                status_code: None,
                kind: Some("connection_error"),
            },
            ForwardOutcome::UnexpectedFailure { class, reason } => RelayError {
                error: "unexpected error",
                details: reason,
                status_code: None,
                kind: Some(class),
            },
        };

        (caller_status, Json(error)).into_response()
    }
}
