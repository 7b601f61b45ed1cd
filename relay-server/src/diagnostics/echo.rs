//! Caller-identity echo for debugging requests that cross proxies.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::http::HeaderMap;
use serde::Serialize;

use super::header_map;

/// What the relay observed about the caller.
#[derive(Debug, Serialize)]
pub struct CallerIdentity {
    pub client_ip: Option<String>,
    pub client_port: Option<u16>,
    pub x_forwarded_for: Option<String>,
    pub x_real_ip: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl CallerIdentity {
    pub fn observe(remote: Option<SocketAddr>, headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        };

        Self {
            client_ip: remote.map(|addr| addr.ip().to_string()),
            client_port: remote.map(|addr| addr.port()),
            x_forwarded_for: header("x-forwarded-for"),
            x_real_ip: header("x-real-ip"),
            headers: header_map(headers),
        }
    }
}
