//! Outbound POST to the downstream endpoint.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde_json::Value;
use tracing::{error, info, warn};
use url::Url;

use super::outcome::ForwardOutcome;
use crate::util::{build_headers, USER_AGENT};

/// Posts one payload per call to the configured target.
///
/// The underlying client keeps no idle connections, so the socket used by a
/// forward is opened and closed within that one inbound request. Redirects
/// are not followed: a 3xx from downstream is the answer to the one POST.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client,
    target: Url,
    timeout: Duration,
}

impl Forwarder {
    /// Build a forwarder for `target`, bounding every attempt by `timeout`.
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

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Forward `payload` once and classify what happened.
    pub async fn forward(&self, payload: &Value) -> ForwardOutcome {
        let started = Instant::now();
        let outcome = self.send(payload).await;
        let latency_ms = started.elapsed().as_millis() as u64;
        let status_code = outcome.downstream_status();

        match &outcome {
            ForwardOutcome::Success { .. } => {
                info!(
                    outcome = outcome.kind(),
                    status_code = ?status_code,
                    latency_ms = latency_ms,
                    "forward_complete"
                );
            }
            ForwardOutcome::UpstreamError { body, .. } => {
                warn!(
                    outcome = outcome.kind(),
                    status_code = ?status_code,
                    body_length = body.len(),
                    latency_ms = latency_ms,
                    "forward_upstream_error"
                );
            }
            ForwardOutcome::ConnectTimeout(reason) | ForwardOutcome::ConnectFailure(reason) => {
                error!(
                    outcome = outcome.kind(),
                    timeout_seconds = self.timeout.as_secs_f64(),
                    error = %reason,
                    latency_ms = latency_ms,
                    "forward_network_error"
                );
            }
            ForwardOutcome::UnexpectedFailure { reason, .. } => {
                error!(
                    outcome = outcome.kind(),
                    error = %reason,
                    latency_ms = latency_ms,
                    "forward_unexpected_error"
                );
            }
        }

        outcome
    }

    async fn send(&self, payload: &Value) -> ForwardOutcome {
        let request = self
            .client
            .post(self.target.clone())
            .timeout(self.timeout)
            .headers(build_headers())
            .json(payload);

        let response = match request.send().await {
            Ok(resp) => resp,
            Err(e) => return ForwardOutcome::from_error(&e),
        };

        let status = response.status().as_u16();

        match response.text().await {
            Ok(body) => ForwardOutcome::from_response(status, body),
            Err(e) => ForwardOutcome::from_error(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn forwarder_for(server: &MockServer, timeout: Duration) -> Forwarder {
        let target = Url::parse(&format!("{}/webhook/zendesk", server.uri())).unwrap();
        Forwarder::new(target, timeout).unwrap()
    }

    #[tokio::test]
    async fn test_forward_success_sends_json_headers() {
        let server = MockServer::start().await;
        let payload = json!({"ticket": {"id": 42, "status": "open"}});

        Mock::given(method("POST"))
            .and(path("/webhook/zendesk"))
            .and(header("content-type", "application/json"))
            .and(header("accept", "application/json"))
            .and(header("user-agent", USER_AGENT))
            .and(body_json(&payload))
            .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
            .expect(1)
            .mount(&server)
            .await;

        let forwarder = forwarder_for(&server, Duration::from_secs(5)).await;
        let outcome = forwarder.forward(&payload).await;

        assert_eq!(
            outcome,
            ForwardOutcome::Success {
                status: 200,
                body: "accepted".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_forward_upstream_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("workflow crashed"))
            .expect(1)
            .mount(&server)
            .await;

        let forwarder = forwarder_for(&server, Duration::from_secs(5)).await;
        let outcome = forwarder.forward(&json!({})).await;

        assert_eq!(
            outcome,
            ForwardOutcome::UpstreamError {
                status: 500,
                body: "workflow crashed".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_forward_does_not_follow_redirects() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/webhook/zendesk"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/elsewhere"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(path("/elsewhere"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
            .expect(0)
            .mount(&server)
            .await;

        let forwarder = forwarder_for(&server, Duration::from_secs(5)).await;
        let outcome = forwarder.forward(&json!({"ticket_id": 7})).await;

        assert!(matches!(outcome, ForwardOutcome::Success { status: 302, .. }));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_forward_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let forwarder = forwarder_for(&server, Duration::from_millis(200)).await;
        let started = Instant::now();
        let outcome = forwarder.forward(&json!({"a": 1})).await;

        assert!(matches!(outcome, ForwardOutcome::ConnectTimeout(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_forward_connection_refused() {
        // Grab a free port, then release it so nothing is listening there
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let target = Url::parse(&format!("http://127.0.0.1:{}/webhook", port)).unwrap();
        let forwarder = Forwarder::new(target, Duration::from_secs(2)).unwrap();
        let outcome = forwarder.forward(&json!({})).await;

        assert!(
            matches!(outcome, ForwardOutcome::ConnectFailure(_)),
            "unexpected outcome: {:?}",
            outcome
        );
    }
}
