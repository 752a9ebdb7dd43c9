//! Port types with validation and port-specification expansion.
//!
//! The `Port` newtype ensures values are always valid port numbers (1-65535).
//! `PortSpec` parses the port grammar accepted by scan requests and expands
//! it into the concrete, deduplicated list of ports to probe.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// A validated network port number (1-65535).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Port(u16);

impl Port {
    /// Minimum valid port number.
    pub const MIN: u16 = 1;
    /// Maximum valid port number.
    pub const MAX: u16 = 65535;

    /// Create a new Port from a u16, returning None if invalid.
    #[inline]
    pub const fn new(port: u16) -> Option<Self> {
        if port >= Self::MIN {
            Some(Self(port))
        } else {
            None
        }
    }

    /// Get the raw port number.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Iterate over every valid port, 1 through 65535.
    pub fn all() -> impl Iterator<Item = Port> {
        (Self::MIN..=Self::MAX).map(Self)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Port {
    type Error = PortError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| PortError::OutOfRange(value.to_string()))
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

/// Error type for port parsing and validation.
///
/// Every variant except `Empty` names the offending token of the specification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("empty port specification")]
    Empty,
    #[error("malformed port token '{0}'")]
    InvalidFormat(String),
    #[error("port '{0}' is out of valid range (1-65535)")]
    OutOfRange(String),
    #[error("invalid port range '{token}': start ({start}) > end ({end})")]
    InvalidRange { token: String, start: u16, end: u16 },
}

impl PortError {
    /// The specification token that failed to parse, if any.
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::InvalidFormat(t) | Self::OutOfRange(t) => Some(t),
            Self::InvalidRange { token, .. } => Some(token),
        }
    }
}

/// A range of ports (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    start: Port,
    end: Port,
}

impl PortRange {
    /// Create a range containing a single port.
    pub const fn single(port: Port) -> Self {
        Self {
            start: port,
            end: port,
        }
    }

    /// Iterate over all ports in this range.
    pub fn iter(&self) -> impl Iterator<Item = Port> {
        (self.start.0..=self.end.0).map(Port)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// A parsed port specification.
///
/// Supports:
/// - `common`: the configured list of well-known ports
/// - `all`: every port from 1 to 65535
/// - a comma-separated list of ports and inclusive ranges, e.g. `22,80,8000-8010`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSpec {
    /// The configured common-ports list.
    Common,
    /// Ports 1-65535.
    All,
    /// Explicit ports and ranges, in the order written.
    List(Vec<PortRange>),
}

impl PortSpec {
    /// Parse a specification string.
    pub fn parse(s: &str) -> Result<Self, PortError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PortError::Empty);
        }
        if s.eq_ignore_ascii_case("common") {
            return Ok(Self::Common);
        }
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }

        let ranges = s
            .split(',')
            .map(|part| parse_token(part.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::List(ranges))
    }

    /// Expand into distinct ports, ordered by first occurrence.
    ///
    /// `common` supplies the list used for [`PortSpec::Common`].
    pub fn expand(&self, common: &[Port]) -> Vec<Port> {
        let ports: Box<dyn Iterator<Item = Port> + '_> = match self {
            Self::Common => Box::new(common.iter().copied()),
            Self::All => return Port::all().collect(),
            Self::List(ranges) => Box::new(ranges.iter().flat_map(|r| r.iter())),
        };

        let mut seen = HashSet::new();
        ports.filter(|p| seen.insert(*p)).collect()
    }
}

impl FromStr for PortSpec {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Common => write!(f, "common"),
            Self::All => write!(f, "all"),
            Self::List(ranges) => {
                let parts: Vec<String> = ranges.iter().map(|r| r.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

/// Parse and expand a specification in one step.
pub fn expand(spec: &str, common: &[Port]) -> Result<Vec<Port>, PortError> {
    Ok(PortSpec::parse(spec)?.expand(common))
}

fn parse_token(token: &str) -> Result<PortRange, PortError> {
    if let Some((a, b)) = token.split_once('-') {
        let start = parse_port(a.trim(), token)?;
        let end = parse_port(b.trim(), token)?;
        if start > end {
            return Err(PortError::InvalidRange {
                token: token.to_string(),
                start: start.0,
                end: end.0,
            });
        }
        return Ok(PortRange { start, end });
    }

    parse_port(token, token).map(PortRange::single)
}

fn parse_port(s: &str, token: &str) -> Result<Port, PortError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PortError::InvalidFormat(token.to_string()));
    }
    // Digits only; anything that overflows u32 is out of range too.
    match s.parse::<u32>() {
        Ok(v) if (Port::MIN as u32..=Port::MAX as u32).contains(&v) => Ok(Port(v as u16)),
        _ => Err(PortError::OutOfRange(token.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(ports: &[Port]) -> Vec<u16> {
        ports.iter().map(|p| p.as_u16()).collect()
    }

    fn common() -> Vec<Port> {
        [22, 80, 443, 80].iter().filter_map(|&p| Port::new(p)).collect()
    }

    #[test]
    fn test_port_validation() {
        assert!(Port::new(0).is_none());
        assert!(Port::new(1).is_some());
        assert!(Port::new(65535).is_some());
    }

    #[test]
    fn test_port_range() {
        let PortSpec::List(ranges) = PortSpec::parse("1-100").unwrap() else {
            panic!("expected an explicit list");
        };
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].iter().count(), 100);
        assert_eq!(ranges[0].to_string(), "1-100");
        assert!(matches!(
            PortSpec::parse("10-5"),
            Err(PortError::InvalidRange { start: 10, end: 5, .. })
        ));
    }

    #[test]
    fn test_expand_mixed_first_seen_order() {
        let ports = expand("1,3,5-7", &[]).unwrap();
        assert_eq!(nums(&ports), vec![1, 3, 5, 6, 7]);

        let ports = expand("8080, 22 ,80-81,22,80", &[]).unwrap();
        assert_eq!(nums(&ports), vec![8080, 22, 80, 81]);
    }

    #[test]
    fn test_expand_common_and_all() {
        let ports = expand("common", &common()).unwrap();
        assert_eq!(nums(&ports), vec![22, 80, 443]);

        let ports = expand("COMMON", &common()).unwrap();
        assert_eq!(ports.len(), 3);

        let ports = expand("all", &[]).unwrap();
        assert_eq!(ports.len(), 65535);
        assert_eq!(ports[0].as_u16(), 1);
        assert_eq!(ports[65534].as_u16(), 65535);
    }

    #[test]
    fn test_expand_rejects_bad_tokens() {
        assert_eq!(expand("", &[]), Err(PortError::Empty));
        assert_eq!(expand("   ", &[]), Err(PortError::Empty));
        assert_eq!(
            expand("invalid", &[]),
            Err(PortError::InvalidFormat("invalid".into()))
        );
        assert_eq!(expand("0", &[]), Err(PortError::OutOfRange("0".into())));
        assert_eq!(
            expand("70000", &[]),
            Err(PortError::OutOfRange("70000".into()))
        );
        assert_eq!(
            expand("80,,443", &[]),
            Err(PortError::InvalidFormat("".into()))
        );
        assert!(matches!(
            expand("100-50", &[]),
            Err(PortError::InvalidRange { start: 100, end: 50, .. })
        ));
        assert_eq!(
            expand("1-2-3", &[]),
            Err(PortError::InvalidFormat("1-2-3".into()))
        );
        assert_eq!(expand("-5", &[]), Err(PortError::InvalidFormat("-5".into())));
    }

    #[test]
    fn test_error_names_offending_token() {
        let err = expand("22,abc,80", &[]).unwrap_err();
        assert_eq!(err.token(), Some("abc"));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_spec_display() {
        let spec: PortSpec = "22, 80-82".parse().unwrap();
        assert_eq!(spec.to_string(), "22,80-82");
        assert_eq!(PortSpec::Common.to_string(), "common");
    }

    #[test]
    fn test_port_serde_rejects_zero() {
        assert!(serde_json::from_str::<Port>("0").is_err());
        assert_eq!(serde_json::from_str::<Port>("443").unwrap().as_u16(), 443);
    }
}
