//! Prober trait abstraction and per-port outcome types.
//!
//! The coordinator only talks to a [`Prober`], which lets tests swap the real
//! TCP prober for an instrumented fake.

use crate::services::default_service;
use crate::types::Port;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Reachability state of a probed port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PortStatus {
    /// Connection established.
    Open,
    /// Peer actively refused the connection.
    Closed,
    /// No response within the timeout, or another I/O failure.
    Filtered,
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Filtered => write!(f, "filtered"),
        }
    }
}

/// Classified result of probing one port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortOutcome {
    /// The port that was probed.
    pub port: Port,
    /// Classification.
    pub status: PortStatus,
    /// Identified or port-default service label.
    pub service: String,
    /// Banner read from an open port; empty when none was collected.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub banner: String,
    /// Time until the connection attempt resolved, in milliseconds.
    pub latency_ms: u64,
    /// Why the port is not open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PortOutcome {
    /// An open port with an identified service and collected banner.
    pub fn open(port: Port, service: impl Into<String>, banner: String, latency_ms: u64) -> Self {
        Self {
            port,
            status: PortStatus::Open,
            service: service.into(),
            banner,
            latency_ms,
            reason: None,
        }
    }

    /// A port whose connection was refused.
    pub fn closed(port: Port, latency_ms: u64) -> Self {
        Self {
            port,
            status: PortStatus::Closed,
            service: default_service(port.as_u16()).to_string(),
            banner: String::new(),
            latency_ms,
            reason: Some("connection refused".to_string()),
        }
    }

    /// A port that timed out or failed with another I/O error.
    pub fn filtered(port: Port, latency_ms: u64, reason: impl Into<String>) -> Self {
        Self {
            port,
            status: PortStatus::Filtered,
            service: default_service(port.as_u16()).to_string(),
            banner: String::new(),
            latency_ms,
            reason: Some(reason.into()),
        }
    }

    /// Check if the port is open.
    pub fn is_open(&self) -> bool {
        self.status == PortStatus::Open
    }
}

/// Trait for single-port probe implementations.
///
/// Implementations must be total: every call yields exactly one outcome,
/// whatever happens on the wire.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe one port on an already-resolved address.
    async fn probe(&self, addr: IpAddr, port: Port) -> PortOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_status_display() {
        assert_eq!(PortStatus::Open.to_string(), "open");
        assert_eq!(PortStatus::Closed.to_string(), "closed");
        assert_eq!(PortStatus::Filtered.to_string(), "filtered");
    }

    #[test]
    fn test_closed_outcome_uses_port_default_service() {
        let outcome = PortOutcome::closed(Port::new(22).unwrap(), 3);
        assert_eq!(outcome.service, "SSH");
        assert_eq!(outcome.reason.as_deref(), Some("connection refused"));
        assert!(!outcome.is_open());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = PortOutcome::filtered(Port::new(9999).unwrap(), 1000, "timed out");
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"FILTERED\""));
        assert!(!json.contains("banner"));
        let parsed: PortOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, outcome);
    }
}
