//! Caller authentication for the relay endpoints.
//!
//! One [`AuthGate`] is built from [`AuthConfig`] at startup and shared by
//! every request. Rejections carry only a generic message: neither the
//! expected nor the presented secret ever appears in a response or a log.

use axum::{
    http::{
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::AuthConfig;

/// Header carrying the shared relay token.
pub const TOKEN_HEADER: &str = "x-relay-token";

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Why a request was turned away. Only ever logged, never returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The credential header was absent.
    Missing,
    /// The credential header could not be decoded.
    Malformed,
    /// Credentials were present but wrong.
    Mismatch,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Missing => "missing",
            RejectReason::Malformed => "malformed",
            RejectReason::Mismatch => "mismatch",
        }
    }
}

/// A refused request, ready to be turned into a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub reason: RejectReason,
    /// `WWW-Authenticate` value, set in Basic mode so clients can prompt.
    pub challenge: Option<String>,
}

/// Result of checking one request's credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Authorized,
    Rejected(Rejection),
}

/// Body of every authentication failure.
#[derive(Serialize)]
struct RejectionBody {
    error: &'static str,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let mut response = (
            self.status,
            Json(RejectionBody {
                error: "invalid credentials",
            }),
        )
            .into_response();

        if let Some(challenge) = self
            .challenge
            .and_then(|c| HeaderValue::from_str(&c).ok())
        {
            response.headers_mut().insert(WWW_AUTHENTICATE, challenge);
        }

        response
    }
}

/// Credential check for whichever mode is configured.
#[derive(Debug, Clone)]
pub struct AuthGate {
    config: AuthConfig,
}

impl AuthGate {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn mode_name(&self) -> &'static str {
        self.config.mode_name()
    }

    /// Check the credentials carried by `headers`.
    pub fn check(&self, headers: &HeaderMap) -> AuthDecision {
        match &self.config {
            AuthConfig::SharedToken { token } => check_header(headers, TOKEN_HEADER, token),
            AuthConfig::ApiKey { key } => check_header(headers, API_KEY_HEADER, key),
            AuthConfig::Basic {
                username,
                password,
                realm,
            } => check_basic(headers, username, password, realm),
        }
    }
}

fn check_header(headers: &HeaderMap, name: &str, expected: &str) -> AuthDecision {
    let forbidden = |reason| {
        AuthDecision::Rejected(Rejection {
            status: StatusCode::FORBIDDEN,
            reason,
            challenge: None,
        })
    };

    let Some(provided) = headers.get(name) else {
        return forbidden(RejectReason::Missing);
    };

    if constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
        AuthDecision::Authorized
    } else {
        forbidden(RejectReason::Mismatch)
    }
}

fn check_basic(headers: &HeaderMap, username: &str, password: &str, realm: &str) -> AuthDecision {
    let unauthorized = |reason| {
        AuthDecision::Rejected(Rejection {
            status: StatusCode::UNAUTHORIZED,
            reason,
            challenge: Some(format!("Basic realm=\"{}\"", realm)),
        })
    };

    let Some(header) = headers.get(AUTHORIZATION) else {
        return unauthorized(RejectReason::Missing);
    };

    let Some((user, pass)) = parse_basic(header) else {
        return unauthorized(RejectReason::Malformed);
    };

    // Both halves are always compared so a wrong username costs the same as a wrong password.
    let user_ok = constant_time_eq(user.as_bytes(), username.as_bytes());
    let pass_ok = constant_time_eq(pass.as_bytes(), password.as_bytes());

    if user_ok & pass_ok {
        AuthDecision::Authorized
    } else {
        unauthorized(RejectReason::Mismatch)
    }
}

/// Decode `Basic base64(user:pass)` into its two halves.
fn parse_basic(header: &HeaderValue) -> Option<(String, String)> {
    let value = header.to_str().ok()?.trim();
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;

    Some((user.to_string(), pass.to_string()))
}

/// Constant-time comparison to prevent timing attacks.
///
/// Both inputs are hashed first, so the loop always runs over 32 bytes and
/// neither the position of the first difference nor the input lengths
/// affect how long it takes.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let a = Sha256::digest(a);
    let b = Sha256::digest(b);

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
