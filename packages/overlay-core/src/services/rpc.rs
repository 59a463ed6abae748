//! Client-facing latency/catalogue RPC, served by PoPs on a UDP port (§4.2).

use std::sync::Arc;
use std::time::Instant;

use tokio::net::UdpSocket;

use crate::events::EventEmitter;
use crate::protocol_constants::MAX_TEXT_MESSAGE;
use crate::services::neighbour_table::NeighbourTable;
use crate::utils::now_unix_secs_f64;

const LATENCY_REQUEST: &str = "LATENCY_REQUEST";
const NO_DATA: &str = "NO_DATA";

/// Builds the RPC response body from the node's current best upstream score.
pub fn format_rpc_response(best: Option<(f64, Vec<String>)>) -> String {
    match best {
        Some((latency_ms, catalogue)) => {
            format!("{latency_ms},{},{}", now_unix_secs_f64(), catalogue.join(","))
        }
        None => NO_DATA.to_string(),
    }
}

/// Parses an RPC response, returning `(latency_ms, server_time, catalogue)`.
pub fn parse_rpc_response(text: &str) -> Option<(f64, f64, Vec<String>)> {
    let text = text.trim();
    if text == NO_DATA {
        return None;
    }
    let mut parts = text.splitn(3, ',');
    let latency_ms: f64 = parts.next()?.parse().ok()?;
    let server_time: f64 = parts.next()?.parse().ok()?;
    let catalogue = parts
        .next()
        .map(|s| s.split(',').filter(|v| !v.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();
    Some((latency_ms, server_time, catalogue))
}

/// Runs the client-facing RPC responder loop. A `"LATENCY_REQUEST"`
/// datagram is answered with this node's own best current upstream score
/// (what its own NeighbourTable currently knows, not a fresh probe).
pub async fn run_rpc_responder(
    socket: UdpSocket,
    neighbours: Arc<NeighbourTable>,
    emitter: Arc<dyn EventEmitter>,
) {
    let mut buf = [0u8; MAX_TEXT_MESSAGE];
    loop {
        let (n, client_addr) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("rpc responder recv failed: {e}");
                continue;
            }
        };
        let text = String::from_utf8_lossy(&buf[..n]);
        if text.trim() != LATENCY_REQUEST {
            continue;
        }
        let best = neighbours
            .best_upstream(Instant::now(), emitter.as_ref())
            .map(|(_, latency_ms, catalogue)| (latency_ms, catalogue));
        let response = format_rpc_response(best);
        if let Err(e) = socket.send_to(response.as_bytes(), client_addr).await {
            log::warn!("rpc responder send to {client_addr} failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_data_when_no_score_available() {
        assert_eq!(format_rpc_response(None), "NO_DATA");
        assert_eq!(parse_rpc_response("NO_DATA"), None);
    }

    #[test]
    fn round_trips_latency_and_catalogue() {
        let response = format_rpc_response(Some((12.5, vec!["clipA".into(), "clipB".into()])));
        let (latency, _server_time, catalogue) = parse_rpc_response(&response).unwrap();
        assert_eq!(latency, 12.5);
        assert_eq!(catalogue, vec!["clipA".to_string(), "clipB".to_string()]);
    }
}
