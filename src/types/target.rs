//! Scan target parsing and resolution.
//!
//! A target is a single host: an IPv4/IPv6 literal or a hostname. Hostnames
//! are resolved once per job, using the system resolver configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Error type for target parsing and resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("invalid target format: '{0}'")]
    InvalidFormat(String),
    #[error("failed to resolve hostname '{0}': {1}")]
    DnsResolutionFailed(String, String),
    #[error("no IP addresses found for hostname '{0}'")]
    NoAddressesFound(String),
}

/// A validated scan target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    /// An IP address literal.
    Ip(IpAddr),
    /// A hostname to be resolved.
    Hostname(String),
}

impl Target {
    /// Parse a target from a string.
    pub fn parse(s: &str) -> Result<Self, TargetError> {
        let s = s.trim();

        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Self::Ip(ip));
        }

        // Dotted quads that failed to parse as an address are not hostnames.
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return Err(TargetError::InvalidFormat(s.to_string()));
        }

        if is_valid_hostname(s) {
            return Ok(Self::Hostname(s.to_ascii_lowercase()));
        }

        Err(TargetError::InvalidFormat(s.to_string()))
    }

    /// Resolve to a single IP address.
    ///
    /// Hostnames resolve to the first address returned.
    pub async fn resolve(&self) -> Result<IpAddr, TargetError> {
        match self {
            Self::Ip(ip) => Ok(*ip),
            Self::Hostname(hostname) => {
                let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|_| {
                    TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
                });

                let response = resolver.lookup_ip(hostname.as_str()).await.map_err(|e| {
                    TargetError::DnsResolutionFailed(hostname.clone(), e.to_string())
                })?;

                response
                    .iter()
                    .next()
                    .ok_or_else(|| TargetError::NoAddressesFound(hostname.clone()))
            }
        }
    }
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ip(ip) => write!(f, "{}", ip),
            Self::Hostname(hostname) => write!(f, "{}", hostname),
        }
    }
}

/// Check if a string is a valid hostname.
fn is_valid_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > 253 {
        return false;
    }

    // Each label must be 1-63 characters
    for label in s.trim_end_matches('.').split('.') {
        if label.is_empty() || label.len() > 63 {
            return false;
        }
        // Must start and end with alphanumeric
        if !label.chars().next().is_some_and(|c| c.is_ascii_alphanumeric()) {
            return false;
        }
        if !label.chars().last().is_some_and(|c| c.is_ascii_alphanumeric()) {
            return false;
        }
        // Can only contain alphanumeric and hyphens
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipv4() {
        let target = Target::parse("192.168.1.1").unwrap();
        assert!(matches!(target, Target::Ip(IpAddr::V4(_))));
    }

    #[test]
    fn test_parse_ipv6() {
        let target = Target::parse("::1").unwrap();
        assert!(matches!(target, Target::Ip(IpAddr::V6(_))));
    }

    #[test]
    fn test_parse_hostname() {
        let target = Target::parse("Scan-Me.Example.com").unwrap();
        assert_eq!(target, Target::Hostname("scan-me.example.com".to_string()));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Target::parse("").is_err());
        assert!(Target::parse("300.1.1.1").is_err());
        assert!(Target::parse("bad host").is_err());
        assert!(Target::parse("-invalid.com").is_err());
        assert!(Target::parse("10.0.0.0/8").is_err());
    }

    #[test]
    fn test_valid_hostname() {
        assert!(is_valid_hostname("example.com"));
        assert!(is_valid_hostname("my-server"));
        assert!(is_valid_hostname("example.com."));
        assert!(!is_valid_hostname("ex_ample.com"));
    }

    #[tokio::test]
    async fn test_resolve_ip_literal() {
        let target = Target::parse("127.0.0.1").unwrap();
        assert_eq!(target.resolve().await.unwrap().to_string(), "127.0.0.1");
    }
}
