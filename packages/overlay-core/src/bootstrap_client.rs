//! Client for the external bootstrap neighbour-query service (§6).
//!
//! The bootstrap service itself — a static `{ caller_ip: [neighbour_ip, ...] }`
//! lookup table served over TCP — is out of scope; this module only speaks
//! its wire contract so a node can resolve its neighbour list at startup.

use std::net::IpAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{OverlayError, OverlayResult};
use crate::protocol_constants::MAX_TEXT_MESSAGE;

const BOOTSTRAP_REQUEST: &str = "Hello, Server!";
const BOOTSTRAP_ERROR: &str = "ERROR";

/// Queries the bootstrap service at `(bootstrap_ip, bootstrap_port)` for this
/// node's static neighbour list.
///
/// # Errors
/// Returns [`OverlayError::BootstrapFailed`] on connect/read failure, a
/// response of `"ERROR"` (this node is not registered), or an empty reply.
pub async fn fetch_neighbours(
    bootstrap_ip: IpAddr,
    bootstrap_port: u16,
    connect_timeout: Duration,
) -> OverlayResult<Vec<IpAddr>> {
    let mut stream = timeout(connect_timeout, TcpStream::connect((bootstrap_ip, bootstrap_port)))
        .await
        .map_err(|_| OverlayError::BootstrapFailed("connect timed out".into()))?
        .map_err(|e| OverlayError::BootstrapFailed(e.to_string()))?;

    stream
        .write_all(BOOTSTRAP_REQUEST.as_bytes())
        .await
        .map_err(|e| OverlayError::BootstrapFailed(e.to_string()))?;

    let mut buf = vec![0u8; MAX_TEXT_MESSAGE];
    let n = timeout(connect_timeout, stream.read(&mut buf))
        .await
        .map_err(|_| OverlayError::BootstrapFailed("read timed out".into()))?
        .map_err(|e| OverlayError::BootstrapFailed(e.to_string()))?;

    parse_bootstrap_response(&String::from_utf8_lossy(&buf[..n]))
}

fn parse_bootstrap_response(text: &str) -> OverlayResult<Vec<IpAddr>> {
    let text = text.trim();
    if text.is_empty() || text == BOOTSTRAP_ERROR {
        return Err(OverlayError::BootstrapFailed(
            "bootstrap service has no neighbours registered for this IP".into(),
        ));
    }
    text.split(',')
        .map(|part| {
            part.trim()
                .parse()
                .map_err(|_| OverlayError::BootstrapFailed(format!("malformed neighbour IP: {part}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_ips() {
        let ips = parse_bootstrap_response("10.0.0.1, 10.0.0.2").unwrap();
        assert_eq!(
            ips,
            vec!["10.0.0.1".parse::<IpAddr>().unwrap(), "10.0.0.2".parse().unwrap()]
        );
    }

    #[test]
    fn error_response_is_a_bootstrap_failure() {
        assert!(parse_bootstrap_response("ERROR").is_err());
    }

    #[test]
    fn empty_response_is_a_bootstrap_failure() {
        assert!(parse_bootstrap_response("").is_err());
    }
}
