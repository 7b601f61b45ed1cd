//! Webhook relay - authenticated Zendesk to n8n forwarding.
//!
//! The `webhook-relay` binary receives Zendesk webhooks, checks the caller's
//! credentials, posts the payload unchanged to an internal n8n endpoint and
//! reports a normalized result.
//!
//! ## Architecture
//!
//! ```text
//! Zendesk → require_auth (AuthGate) → relay_webhook → Forwarder → n8n
//!                                                         ↓
//!                                                  ForwardOutcome → caller
//! ```
//!
//! `/test-connection` and `/debug-ip` are independent diagnostics.

pub mod config;
pub mod diagnostics;
pub mod forward;
pub mod util;
pub mod web;

// Re-export commonly used types
pub use config::{AuthConfig, Config, ConfigError};
pub use diagnostics::{CallerIdentity, DiagnosticReport, Prober};
pub use forward::{ForwardOutcome, Forwarder};
pub use web::{router, AppState, AuthGate};
