//! Forwarding of authenticated payloads to the downstream endpoint.
//!
//! ## Flow
//!
//! ```text
//! payload → Forwarder::forward() → ForwardOutcome → caller response
//! ```
//!
//! Exactly one attempt is made per inbound request; there is no retry.

pub mod client;
pub mod outcome;

pub use client::Forwarder;
pub use outcome::{error_chain, failure_class, ForwardOutcome, RelayError, RelayOk};
