//! Connectivity probes against the forward target.
//!
//! DNS, TCP and HTTP are checked independently and concurrently, each under
//! its own timeout; a failure in one never prevents the others from running.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::info;
use url::{Host, Url};

use super::header_map;
use crate::forward::{error_chain, ForwardOutcome};
use crate::util::USER_AGENT;

/// Aggregated result of the three probes.
#[derive(Debug, Serialize)]
pub struct DiagnosticReport {
    pub target: String,
    pub dns: DnsProbe,
    pub tcp: TcpProbe,
    pub http: HttpProbe,
}

#[derive(Debug, Serialize)]
pub struct DnsProbe {
    pub success: bool,
    pub host: String,
    pub addresses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TcpProbe {
    pub success: bool,
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HttpProbe {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<&'static str>,
}

/// Runs the probes for one configured target.
#[derive(Debug, Clone)]
pub struct Prober {
    client: Client,
    target: Url,
    timeout: Duration,
}

impl Prober {
    pub fn new(target: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(0)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            target,
            timeout,
        })
    }

    /// Run all three probes and aggregate them.
    pub async fn run(&self) -> DiagnosticReport {
        let (dns, tcp, http) = tokio::join!(self.probe_dns(), self.probe_tcp(), self.probe_http());

        info!(
            target_host = ?self.target.host_str(),
            dns_ok = dns.success,
            tcp_ok = tcp.success,
            http_ok = http.success,
            http_status = ?http.status_code,
            "connectivity_probe_complete"
        );

        DiagnosticReport {
            target: self.target.to_string(),
            dns,
            tcp,
            http,
        }
    }

    async fn probe_dns(&self) -> DnsProbe {
        let host = target_host(&self.target).unwrap_or_default();
        let port = target_port(&self.target);

        let failed = |error: String| DnsProbe {
            success: false,
            host: host.clone(),
            addresses: Vec::new(),
            error: Some(error),
        };

        if host.is_empty() {
            return failed("target has no host".to_string());
        }

        let resolved = timeout(self.timeout, lookup_host((host.as_str(), port))).await;

        match resolved {
            Ok(Ok(addrs)) => {
                let mut addresses: Vec<String> = Vec::new();
                for addr in addrs {
                    let ip = addr.ip().to_string();
                    if !addresses.contains(&ip) {
                        addresses.push(ip);
                    }
                }
                DnsProbe {
                    success: !addresses.is_empty(),
                    host: host.clone(),
                    error: addresses
                        .is_empty()
                        .then(|| "no addresses returned".to_string()),
                    addresses,
                }
            }
            Ok(Err(e)) => failed(e.to_string()),
            Err(_) => failed(format!(
                "resolution timed out after {:.1}s",
                self.timeout.as_secs_f64()
            )),
        }
    }

    async fn probe_tcp(&self) -> TcpProbe {
        let host = target_host(&self.target).unwrap_or_default();
        let port = target_port(&self.target);

        let result = if host.is_empty() {
            Err("target has no host".to_string())
        } else {
            match timeout(self.timeout, TcpStream::connect((host.as_str(), port))).await {
                Ok(Ok(_stream)) => Ok(()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!(
                    "connect timed out after {:.1}s",
                    self.timeout.as_secs_f64()
                )),
            }
        };

        TcpProbe {
            success: result.is_ok(),
            host,
            port,
            error: result.err(),
        }
    }

    async fn probe_http(&self) -> HttpProbe {
        let request = self.client.get(self.target.clone()).timeout(self.timeout);

        match request.send().await {
            Ok(resp) => HttpProbe {
                success: true,
                status_code: Some(resp.status().as_u16()),
                headers: Some(header_map(resp.headers())),
                error: None,
                error_type: None,
            },
            Err(e) => HttpProbe {
                success: false,
                status_code: None,
                headers: None,
                error: Some(error_chain(&e)),
                error_type: Some(ForwardOutcome::from_error(&e).kind()),
            },
        }
    }
}

/// Host part of the URL in a form `lookup_host` accepts (no IPv6 brackets).
pub fn target_host(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Domain(domain) => Some(domain.to_string()),
        Host::Ipv4(ip) => Some(ip.to_string()),
        Host::Ipv6(ip) => Some(ip.to_string()),
    }
}

/// Explicit port, else 443 for https and 80 for anything else.
pub fn target_port(url: &Url) -> u16 {
    url.port()
        .unwrap_or(if url.scheme() == "https" { 443 } else { 80 })
}
