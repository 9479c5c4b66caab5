//! IP allow-list matching.
//!
//! Entries are either a bare address (matches only that host) or
//! `address/prefix`. IPv4-mapped IPv6 addresses are compared as IPv4 so a
//! dual-stack listener still matches `10.0.0.0/8`.

use ipnet::IpNet;
use std::net::IpAddr;

use thiserror::Error;

use crate::config::FilterConfig;

/// Error returned for an entry that is neither an address nor a CIDR block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseRangeError {
    #[error("invalid address in `{0}`")]
    Address(String),
    #[error("invalid prefix length in `{0}`")]
    Prefix(String),
}

/// Parse an allow-list entry into a network.
///
/// A bare address becomes a host network (`/32` or `/128`).
pub fn parse_range(s: &str) -> Result<IpNet, ParseRangeError> {
    let entry = s.trim();
    match entry.split_once('/') {
        Some((addr, _)) => {
            if addr.parse::<IpAddr>().is_err() {
                return Err(ParseRangeError::Address(entry.to_string()));
            }
            entry
                .parse::<IpNet>()
                .map(|net| net.trunc())
                .map_err(|_| ParseRangeError::Prefix(entry.to_string()))
        }
        None => {
            let ip = entry
                .parse::<IpAddr>()
                .map_err(|_| ParseRangeError::Address(entry.to_string()))?
                .to_canonical();
            let host_len = if ip.is_ipv4() { 32 } else { 128 };
            IpNet::new(ip, host_len).map_err(|_| ParseRangeError::Prefix(entry.to_string()))
        }
    }
}

/// Options the filter is constructed with.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub allowed_ips: Vec<String>,
    pub block_by_default: bool,
    pub trust_proxy: bool,
}

impl From<&FilterConfig> for FilterOptions {
    fn from(config: &FilterConfig) -> Self {
        Self {
            allowed_ips: config.allowed_ranges.clone(),
            block_by_default: config.block_by_default,
            trust_proxy: config.trust_proxy,
        }
    }
}

/// Allow-list admission filter.
///
/// Built once before the listener starts; the request path only reads it.
#[derive(Debug, Clone)]
pub struct IpFilter {
    allowed: Vec<IpNet>,
    block_by_default: bool,
    trust_proxy: bool,
}

impl IpFilter {
    /// Build a filter. Malformed entries are logged and skipped.
    pub fn new(options: FilterOptions) -> Self {
        let mut filter = Self {
            allowed: Vec::with_capacity(options.allowed_ips.len()),
            block_by_default: options.block_by_default,
            trust_proxy: options.trust_proxy,
        };

        for entry in &options.allowed_ips {
            if let Err(e) = filter.allow_ip(entry) {
                tracing::warn!(entry = %entry, error = %e, "Skipping malformed allow-list entry");
            }
        }

        tracing::debug!(
            ranges = filter.allowed.len(),
            block_by_default = filter.block_by_default,
            trust_proxy = filter.trust_proxy,
            "IP filter built"
        );

        filter
    }

    /// Add one address or CIDR block to the allow-list.
    pub fn allow_ip(&mut self, entry: &str) -> Result<(), ParseRangeError> {
        self.allowed.push(parse_range(entry)?);
        Ok(())
    }

    /// Admission decision for a single client address.
    pub fn allowed(&self, ip: IpAddr) -> bool {
        if !self.block_by_default {
            return true;
        }
        let ip = ip.to_canonical();
        self.allowed.iter().any(|net| net.contains(&ip))
    }

    pub fn trust_proxy(&self) -> bool {
        self.trust_proxy
    }

    pub fn ranges(&self) -> &[IpNet] {
        &self.allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn base_filter() -> IpFilter {
        IpFilter::new(FilterOptions::from(&FilterConfig::default()))
    }

    #[test]
    fn test_parse_cidr_and_host() {
        let block = parse_range("10.0.0.0/8").unwrap();
        assert_eq!(block.prefix_len(), 8);
        assert!(block.contains(&ip("10.255.1.2")));
        assert!(!block.contains(&ip("11.0.0.1")));

        let host = parse_range(" 203.0.113.5 ").unwrap();
        assert_eq!(host.prefix_len(), 32);
        assert!(host.contains(&ip("203.0.113.5")));
        assert!(!host.contains(&ip("203.0.113.6")));
    }

    #[test]
    fn test_parse_truncates_host_bits() {
        let block = parse_range("192.168.7.9/16").unwrap();
        assert_eq!(block.to_string(), "192.168.0.0/16");
    }

    #[test]
    fn test_parse_rejects_malformed_entries() {
        assert_eq!(
            parse_range("10.0.0/8"),
            Err(ParseRangeError::Address("10.0.0/8".into()))
        );
        assert_eq!(
            parse_range("10.0.0.0/33"),
            Err(ParseRangeError::Prefix("10.0.0.0/33".into()))
        );
        assert_eq!(
            parse_range("10.0.0.0/x"),
            Err(ParseRangeError::Prefix("10.0.0.0/x".into()))
        );
        assert!(parse_range("").is_err());
    }

    #[test]
    fn test_zero_prefix_matches_everything_in_family() {
        let any_v4 = parse_range("0.0.0.0/0").unwrap();
        assert!(any_v4.contains(&ip("8.8.8.8")));
        assert!(!any_v4.contains(&ip("2001:db8::1")));
    }

    #[test]
    fn test_ipv6_ranges() {
        let filter = IpFilter::new(FilterOptions {
            allowed_ips: vec!["2001:db8::/32".into()],
            block_by_default: true,
            trust_proxy: false,
        });
        assert!(filter.allowed(ip("2001:db8:1::7")));
        assert!(!filter.allowed(ip("2001:db9::1")));
        assert!(!filter.allowed(ip("10.0.0.1")));
    }

    #[test]
    fn test_mapped_ipv4_matches_v4_range() {
        let filter = base_filter();
        assert!(filter.allowed(ip("::ffff:10.1.2.3")));
    }

    #[test]
    fn test_base_ranges() {
        let filter = base_filter();
        assert!(filter.allowed(ip("192.168.1.1")));
        assert!(filter.allowed(ip("10.0.0.1")));
        assert!(filter.allowed(ip("172.31.255.255")));
        assert!(!filter.allowed(ip("172.32.0.1")));
        assert!(!filter.allowed(ip("127.0.0.1")));
        assert!(!filter.allowed(ip("203.0.113.5")));
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let filter = IpFilter::new(FilterOptions {
            allowed_ips: vec!["bogus".into(), "203.0.113.5/32".into()],
            block_by_default: true,
            trust_proxy: false,
        });
        assert_eq!(filter.ranges().len(), 1);
        assert!(filter.allowed(ip("203.0.113.5")));
    }

    #[test]
    fn test_allow_all_when_not_blocking_by_default() {
        let filter = IpFilter::new(FilterOptions::default());
        assert!(filter.allowed(ip("8.8.8.8")));
    }

    #[test]
    fn test_allow_ip_extends_list() {
        let mut filter = base_filter();
        assert!(!filter.allowed(ip("198.51.100.7")));
        filter.allow_ip("198.51.100.0/24").unwrap();
        assert!(filter.allowed(ip("198.51.100.7")));
        assert!(filter.allow_ip("198.51.100.0/x").is_err());
    }
}
