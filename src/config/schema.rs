//! Configuration schema definitions.

use std::net::SocketAddr;

/// Listen address of the server. Not configurable.
pub const BIND_ADDRESS: &str = "0.0.0.0:8000";

/// Private network ranges every deployment admits.
pub const BASE_ALLOWED_RANGES: [&str; 3] = ["192.168.0.0/16", "10.0.0.0/8", "172.16.0.0/12"];

/// Default segment name reported to the tracing backend.
pub const DEFAULT_SEGMENT_NAME: &str = "myApp";

/// Root configuration for the server.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Admission filter settings.
    pub filter: FilterConfig,

    /// Trace segment settings.
    pub tracing: TracingConfig,
}

impl ServerConfig {
    /// Address the listener binds to.
    pub fn bind_address(&self) -> &'static str {
        BIND_ADDRESS
    }
}

/// Admission filter configuration.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Allowed IP/CIDR entries, base ranges first.
    pub allowed_ranges: Vec<String>,

    /// Reject any client not matched by `allowed_ranges`.
    pub block_by_default: bool,

    /// Read the client address from forwarding headers when present.
    pub trust_proxy: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            allowed_ranges: BASE_ALLOWED_RANGES.iter().map(|r| r.to_string()).collect(),
            block_by_default: true,
            trust_proxy: true,
        }
    }
}

/// Trace segment configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Name stamped on every segment.
    pub segment_name: String,

    /// Where segments are sent.
    pub daemon_address: SocketAddr,

    /// Skip segment emission entirely.
    pub disabled: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            segment_name: DEFAULT_SEGMENT_NAME.to_string(),
            daemon_address: SocketAddr::from(([127, 0, 0, 1], 2000)),
            disabled: false,
        }
    }
}
