//! Banner collection for open TCP ports.
//!
//! Sends a port-specific probe, then reads line-oriented text under a short
//! secondary timeout. Collection never fails: any error yields an empty banner,
//! since the port is already known to be open.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;
use tracing::debug;

/// Maximum bytes read from a peer while collecting a banner.
const MAX_BANNER_SIZE: u64 = 4096;

/// Request line sent to web ports.
const HTTP_PROBE: &[u8] = b"GET / HTTP/1.0\r\n\r\n";

/// Sent to ports without a table entry.
const DEFAULT_PROBE: &[u8] = b"\r\n";

/// Probe payloads by port. An empty payload means the peer greets first.
const PROBES: &[(u16, &[u8])] = &[
    (80, HTTP_PROBE),
    (8080, HTTP_PROBE),
    (443, HTTP_PROBE),
    (8443, HTTP_PROBE),
    (6379, b"PING\r\n"),
    (3306, b""),
    (5432, b""),
];

/// Tokens that identify a service on the first line they appear in.
const STOP_MARKERS: &[&str] = &["SSH-", "HTTP/"];

/// Limits applied while collecting a banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BannerSettings {
    /// Bound on each write and each line read.
    pub timeout: Duration,
    /// Maximum number of lines kept.
    pub max_lines: usize,
}

impl Default for BannerSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            max_lines: 10,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum BannerError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Probe payload sent to `port` before reading.
pub fn probe_payload(port: u16) -> &'static [u8] {
    PROBES
        .iter()
        .find(|(p, _)| *p == port)
        .map(|(_, payload)| *payload)
        .unwrap_or(DEFAULT_PROBE)
}

/// Collect a banner from an open connection.
///
/// Returns an empty string when nothing could be read.
pub async fn collect<S>(stream: &mut S, port: u16, settings: &BannerSettings) -> String
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match try_collect(stream, port, settings).await {
        Ok(banner) => banner,
        Err(e) => {
            debug!(port, error = %e, "banner collection failed");
            String::new()
        }
    }
}

async fn try_collect<S>(
    stream: &mut S,
    port: u16,
    settings: &BannerSettings,
) -> Result<String, BannerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let probe = probe_payload(port);
    if !probe.is_empty() {
        timeout(settings.timeout, async {
            stream.write_all(probe).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| BannerError::Timeout(settings.timeout))??;
    }

    let mut reader = BufReader::new((&mut *stream).take(MAX_BANNER_SIZE));
    let mut lines: Vec<String> = Vec::new();
    let mut buf = Vec::new();

    while lines.len() < settings.max_lines {
        buf.clear();
        match timeout(settings.timeout, reader.read_until(b'\n', &mut buf)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(_)) => {
                let line = sanitize_line(&buf);
                let stop = STOP_MARKERS.iter().any(|m| line.contains(m));
                lines.push(line);
                if stop {
                    break;
                }
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                // A peer that greeted and then went quiet is waiting for a
                // command; what arrived so far is the banner.
                if !buf.is_empty() {
                    lines.push(sanitize_line(&buf));
                }
                if lines.is_empty() {
                    return Err(BannerError::Timeout(settings.timeout));
                }
                break;
            }
        }
    }

    Ok(lines.join("\n").trim().to_string())
}

/// Decode one line, replacing non-printable bytes with '.'.
fn sanitize_line(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    text.trim_end_matches(['\r', '\n'])
        .chars()
        .map(|c| match c {
            '\t' => ' ',
            c if c.is_control() => '.',
            c => c,
        })
        .collect::<String>()
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn quick() -> BannerSettings {
        BannerSettings {
            timeout: Duration::from_millis(100),
            max_lines: 10,
        }
    }

    #[test]
    fn test_probe_payloads() {
        assert_eq!(probe_payload(80), b"GET / HTTP/1.0\r\n\r\n");
        assert_eq!(probe_payload(8443), b"GET / HTTP/1.0\r\n\r\n");
        assert_eq!(probe_payload(6379), b"PING\r\n");
        assert!(probe_payload(3306).is_empty());
        assert!(probe_payload(5432).is_empty());
        assert_eq!(probe_payload(22), b"\r\n");
    }

    #[test]
    fn test_sanitize_line() {
        assert_eq!(sanitize_line(b"SSH-2.0-OpenSSH_8.9\r\n"), "SSH-2.0-OpenSSH_8.9");
        assert_eq!(sanitize_line(b"\x00\x01Hello\x02World\n"), "..Hello.World");
    }

    #[tokio::test]
    async fn test_ssh_banner_stops_at_marker() {
        let (mut client, mut server) = duplex(1024);
        server
            .write_all(b"SSH-2.0-OpenSSH_8.9\r\nshould not be read\r\n")
            .await
            .unwrap();

        let banner = collect(&mut client, 22, &quick()).await;
        assert_eq!(banner, "SSH-2.0-OpenSSH_8.9");

        // The default probe went out first.
        let mut sent = [0u8; 2];
        server.read_exact(&mut sent).await.unwrap();
        assert_eq!(&sent, b"\r\n");
    }

    #[tokio::test]
    async fn test_http_probe_and_status_line() {
        let (mut client, mut server) = duplex(1024);
        let peer = tokio::spawn(async move {
            let mut req = vec![0u8; HTTP_PROBE.len()];
            server.read_exact(&mut req).await.unwrap();
            assert_eq!(req, HTTP_PROBE);
            server
                .write_all(b"HTTP/1.0 200 OK\r\nServer: test\r\n\r\n")
                .await
                .unwrap();
            server
        });

        let banner = collect(&mut client, 80, &quick()).await;
        assert_eq!(banner, "HTTP/1.0 200 OK");
        drop(peer.await.unwrap());
    }

    #[tokio::test]
    async fn test_line_budget() {
        let (mut client, mut server) = duplex(4096);
        for i in 0..20 {
            server
                .write_all(format!("line {}\r\n", i).as_bytes())
                .await
                .unwrap();
        }

        let settings = BannerSettings {
            max_lines: 3,
            ..quick()
        };
        let banner = collect(&mut client, 4000, &settings).await;
        assert_eq!(banner, "line 0\nline 1\nline 2");
    }

    #[tokio::test]
    async fn test_silent_peer_yields_empty_banner() {
        let (mut client, _server) = duplex(1024);
        let banner = collect(&mut client, 3306, &quick()).await;
        assert!(banner.is_empty());
    }

    #[tokio::test]
    async fn test_greeting_then_idle_keeps_greeting() {
        let (mut client, mut server) = duplex(1024);
        server
            .write_all(b"220 ProFTPD FTP server ready\r\n")
            .await
            .unwrap();

        let banner = collect(&mut client, 21, &quick()).await;
        assert_eq!(banner, "220 ProFTPD FTP server ready");
    }

    #[tokio::test]
    async fn test_unterminated_greeting_is_kept() {
        let (mut client, mut server) = duplex(1024);
        server
            .write_all(b"J\x00\x00\x005.7.33\x00mysql_native_password")
            .await
            .unwrap();

        let banner = collect(&mut client, 3306, &quick()).await;
        assert!(banner.contains("mysql_native_password"));
    }

    #[tokio::test]
    async fn test_closed_peer_yields_empty_banner() {
        let (mut client, server) = duplex(1024);
        drop(server);
        let banner = collect(&mut client, 22, &quick()).await;
        assert!(banner.is_empty());
    }
}
