//! Operator diagnostics, never on the relay path.
//!
//! - [`Prober`]: DNS, TCP and HTTP reachability of the forward target
//! - [`CallerIdentity`]: client address and proxy headers as seen by the relay

pub mod echo;
pub mod probe;

use std::collections::BTreeMap;

use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::web::auth::{API_KEY_HEADER, TOKEN_HEADER};

pub use echo::CallerIdentity;
pub use probe::{DiagnosticReport, DnsProbe, HttpProbe, Prober, TcpProbe};

/// Flatten headers into a sorted map. Repeated headers are joined with `, `
/// and credential headers are masked.
pub fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();

    for (name, value) in headers {
        let value = if *name == AUTHORIZATION || *name == TOKEN_HEADER || *name == API_KEY_HEADER {
            "<redacted>".to_string()
        } else {
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        };

        map.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    map
}
