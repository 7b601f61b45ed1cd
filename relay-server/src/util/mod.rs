//! Small helpers shared by the forwarder and the diagnostics probes.

pub mod user_agent;

pub use user_agent::{build_headers, USER_AGENT};
