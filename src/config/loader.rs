//! Configuration loading from the process environment.

use std::net::SocketAddr;

use crate::config::schema::ServerConfig;

/// Comma-separated IP/CIDR entries appended to the allow-list.
pub const WHITE_IP_LIST: &str = "WHITE_IP_LIST";
/// Overrides the fixed segment name.
pub const AWS_XRAY_TRACING_NAME: &str = "AWS_XRAY_TRACING_NAME";
/// `host:port` of the trace daemon.
pub const AWS_XRAY_DAEMON_ADDRESS: &str = "AWS_XRAY_DAEMON_ADDRESS";
/// `true` turns segment emission off.
pub const AWS_XRAY_SDK_DISABLED: &str = "AWS_XRAY_SDK_DISABLED";

/// Build the configuration from the real process environment.
pub fn load_from_env() -> ServerConfig {
    load_with(|key| std::env::var(key).ok())
}

/// Build the configuration from an arbitrary variable lookup.
pub fn load_with<F>(lookup: F) -> ServerConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = ServerConfig::default();

    match WhiteList::parse(lookup(WHITE_IP_LIST).as_deref()) {
        WhiteList::Unset => tracing::info!("{} environment variable is not set", WHITE_IP_LIST),
        WhiteList::Blank => tracing::info!("{} environment variable has no entries", WHITE_IP_LIST),
        WhiteList::Entries(entries) => {
            for entry in entries {
                tracing::info!(entry = %entry, "IP/CIDR");
                config.filter.allowed_ranges.push(entry);
            }
        }
    }

    if let Some(name) = lookup(AWS_XRAY_TRACING_NAME).filter(|n| !n.trim().is_empty()) {
        config.tracing.segment_name = name.trim().to_string();
    }

    if let Some(addr) = lookup(AWS_XRAY_DAEMON_ADDRESS) {
        match addr.trim().parse::<SocketAddr>() {
            Ok(parsed) => config.tracing.daemon_address = parsed,
            Err(e) => tracing::warn!(
                address = %addr,
                error = %e,
                default = %config.tracing.daemon_address,
                "Invalid daemon address, using default"
            ),
        }
    }

    if let Some(flag) = lookup(AWS_XRAY_SDK_DISABLED) {
        config.tracing.disabled = flag.trim().eq_ignore_ascii_case("true");
    }

    config
}

/// State of the `WHITE_IP_LIST` variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhiteList {
    Unset,
    /// Set, but every comma-separated entry is blank.
    Blank,
    Entries(Vec<String>),
}

impl WhiteList {
    /// Split a comma-separated list, dropping blank entries.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return WhiteList::Unset;
        };
        let entries: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect();
        if entries.is_empty() {
            WhiteList::Blank
        } else {
            WhiteList::Entries(entries)
        }
    }
}
