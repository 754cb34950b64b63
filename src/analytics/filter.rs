use ipnetwork::IpNetwork;
use std::net::IpAddr;

/// Source identifiers that always count as the operator's own traffic.
pub const LOCAL_SOURCES: [&str; 3] = ["127.0.0.1", "localhost", "::1"];

/// Matcher for local traffic: the fixed loopback set plus any configured
/// networks.
#[derive(Debug, Clone, Default)]
pub struct LocalSources {
    networks: Vec<IpNetwork>,
}

impl LocalSources {
    pub fn new(networks: Vec<IpNetwork>) -> Self {
        Self { networks }
    }

    /// Build from a comma-separated CIDR list; invalid entries are skipped.
    pub fn from_config(networks_str: &str) -> Self {
        Self::new(parse_networks(networks_str))
    }

    pub fn networks(&self) -> &[IpNetwork] {
        &self.networks
    }

    pub fn is_local(&self, ip: &str) -> bool {
        let ip = ip.trim();
        if LOCAL_SOURCES.contains(&ip) {
            return true;
        }

        if self.networks.is_empty() {
            return false;
        }

        match ip.parse::<IpAddr>() {
            Ok(addr) => self.networks.iter().any(|network| network.contains(addr)),
            Err(_) => false,
        }
    }
}

/// Parse a comma-separated list of CIDR networks
pub fn parse_networks(networks_str: &str) -> Vec<IpNetwork> {
    if networks_str.trim().is_empty() {
        return Vec::new();
    }

    networks_str
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect()
}

/// Predicate on the verbatim request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathFilter {
    Exact(String),
    Contains(String),
}

impl PathFilter {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(expected) => path == expected,
            Self::Contains(needle) => path.contains(needle.as_str()),
        }
    }
}
