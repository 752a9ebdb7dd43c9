//! TCP connect prober.
//!
//! Classifies a port by attempting a full TCP handshake: an established
//! connection is open, an active refusal is closed, and a timeout or any
//! other failure is filtered. Open ports get a banner and a service label.

use crate::banner::{self, BannerSettings};
use crate::scanner::rate_limiter::RateLimiter;
use crate::scanner::traits::{PortOutcome, Prober};
use crate::services::identify;
use crate::types::Port;
use async_trait::async_trait;
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Why a connection attempt did not produce a stream.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("connection refused")]
    Refused,
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for ProbeError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionRefused => Self::Refused,
            _ => Self::Io(e),
        }
    }
}

/// TCP connect prober.
///
/// Does not require elevated privileges.
pub struct TcpProber {
    connect_timeout: Duration,
    banner: BannerSettings,
    rate_limiter: Option<RateLimiter>,
}

impl TcpProber {
    /// Create a new prober.
    ///
    /// # Arguments
    /// * `connect_timeout` - Bound on each connection attempt
    /// * `banner` - Limits for banner collection on open ports
    pub fn new(connect_timeout: Duration, banner: BannerSettings) -> Self {
        Self {
            connect_timeout,
            banner,
            rate_limiter: None,
        }
    }

    /// Pace connection attempts through a shared rate limiter.
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// The configured connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Bound a connection attempt by the connect timeout.
    async fn attempt_connect<F>(&self, connect: F) -> Result<TcpStream, ProbeError>
    where
        F: Future<Output = io::Result<TcpStream>>,
    {
        match timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ProbeError::Timeout(self.connect_timeout)),
        }
    }

    /// Classify `port` using `connect` to establish the connection.
    async fn probe_with<F>(&self, addr: IpAddr, port: Port, connect: F) -> PortOutcome
    where
        F: Future<Output = io::Result<TcpStream>>,
    {
        if let Some(limiter) = &self.rate_limiter {
            limiter.wait().await;
        }

        let port_num = port.as_u16();
        let start = Instant::now();

        match self.attempt_connect(connect).await {
            Ok(mut stream) => {
                let latency = start.elapsed().as_millis() as u64;
                let banner = banner::collect(&mut stream, port_num, &self.banner).await;
                // Closed whatever the collector did.
                let _ = stream.shutdown().await;
                drop(stream);

                let service = identify(port_num, &banner);
                debug!(%addr, port = port_num, service, "port open");
                PortOutcome::open(port, service, banner, latency)
            }
            Err(ProbeError::Refused) => {
                let latency = start.elapsed().as_millis() as u64;
                debug!(%addr, port = port_num, "port closed (connection refused)");
                PortOutcome::closed(port, latency)
            }
            Err(e) => {
                let latency = start.elapsed().as_millis() as u64;
                debug!(%addr, port = port_num, error = %e, "port filtered");
                PortOutcome::filtered(port, latency, e.to_string())
            }
        }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, addr: IpAddr, port: Port) -> PortOutcome {
        let target = SocketAddr::new(addr, port.as_u16());
        self.probe_with(addr, port, TcpStream::connect(target)).await
    }
}
