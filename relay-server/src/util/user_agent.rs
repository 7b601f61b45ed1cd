//! Identifying user agent and standard headers for outbound requests.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};

/// User agent sent on every outbound request, e.g. `webhook-relay/0.1.0`.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Build standard headers for forwarded JSON payloads.
pub fn build_headers() -> HeaderMap {
    let json = HeaderValue::from_static("application/json");

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, json.clone());
    headers.insert(ACCEPT, json);
    headers
}
