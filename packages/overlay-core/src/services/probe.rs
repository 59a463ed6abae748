//! Latency probe plane: emitter, receiver, and relay forwarding (§4.1).
//!
//! Probes ride their own short-lived TCP connections. The payload doubles as
//! a catalogue announcement, so every probe cycle also keeps neighbours'
//! advertised video lists fresh.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::events::{EventEmitter, ProbeEvent};
use crate::protocol_constants::{
    IO_TIMEOUT, MAX_TEXT_MESSAGE, PROBE_FORWARD_PACING, PROBE_INTERVAL,
};
use crate::services::neighbour_table::NeighbourTable;
use crate::utils::{latency_ms_since, now_millis, now_unix_secs_f64};

/// Serialises a probe payload: `"<unix_seconds_float>,<video1>,<video2>,..."`.
pub fn format_probe_payload(timestamp: f64, catalogue: &[String]) -> String {
    if catalogue.is_empty() {
        format!("{timestamp}")
    } else {
        format!("{timestamp},{}", catalogue.join(","))
    }
}

/// Parses a probe payload, splitting once on the first comma.
///
/// Returns the sender's wall-clock timestamp and advertised catalogue.
pub fn parse_probe_payload(payload: &str) -> Result<(f64, Vec<String>), ()> {
    let payload = payload.trim();
    let (ts_part, catalogue_part) = match payload.split_once(',') {
        Some((ts, rest)) => (ts, rest),
        None => (payload, ""),
    };
    let timestamp: f64 = ts_part.parse().map_err(|_| ())?;
    let catalogue = if catalogue_part.is_empty() {
        Vec::new()
    } else {
        catalogue_part.split(',').map(str::to_string).collect()
    };
    Ok((timestamp, catalogue))
}

/// Emits one probe round to every neighbour in `neighbours`.
///
/// Each connection gets its own `IO_TIMEOUT` connect budget; a failed send
/// records that neighbour as unreachable (`+inf` latency) rather than
/// aborting the round.
pub async fn emit_probe_round(
    neighbours: &[IpAddr],
    probe_port: u16,
    catalogue: &[String],
    table: &NeighbourTable,
) {
    let payload = format_probe_payload(now_unix_secs_f64(), catalogue);
    for &ip in neighbours {
        if send_probe(ip, probe_port, &payload).await.is_err() {
            table.record_probe(ip, f64::INFINITY, Vec::new(), Instant::now());
        }
    }
}

/// Runs the periodic probe emitter (§4.1, §5 task 3): every `PROBE_INTERVAL`,
/// emits one probe round advertising `catalogue` to every configured
/// neighbour. `neighbours` is the node's static neighbour list (from
/// bootstrap/config), not the NeighbourTable — a node only probes the peers
/// it was told about, it doesn't probe whoever happens to have probed it.
pub async fn run_probe_emitter_loop(
    neighbours: Vec<IpAddr>,
    probe_port: u16,
    catalogue: Vec<String>,
    table: Arc<NeighbourTable>,
) {
    let mut interval = tokio::time::interval(PROBE_INTERVAL);
    loop {
        interval.tick().await;
        emit_probe_round(&neighbours, probe_port, &catalogue, &table).await;
    }
}

async fn send_probe(ip: IpAddr, port: u16, payload: &str) -> std::io::Result<()> {
    let mut stream = timeout(IO_TIMEOUT, TcpStream::connect((ip, port)))
        .await
        .map_err(|_| std::io::Error::from(std::io::ErrorKind::TimedOut))??;
    stream.write_all(payload.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Runs the probe receive loop. If `forward` is set (relay role), every
/// recorded probe is re-emitted verbatim to every other neighbour in the
/// node's own static `neighbours` list, paced by `PROBE_FORWARD_PACING`, with
/// sender-suppression to avoid reflecting a probe back to its originator.
///
/// `neighbours` is the node's configured peer list, the same one
/// `run_probe_emitter_loop` uses — not the `NeighbourTable`, which only holds
/// whoever has already probed *this* node and would leave a pure relay with
/// nothing left to forward to after excluding the sender.
pub async fn run_probe_receiver(
    listener: TcpListener,
    table: Arc<NeighbourTable>,
    neighbours: Vec<IpAddr>,
    forward: bool,
    probe_port: u16,
    emitter: Arc<dyn EventEmitter>,
) {
    let neighbours = Arc::new(neighbours);
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("probe listener accept failed: {e}");
                continue;
            }
        };
        let table = Arc::clone(&table);
        let neighbours = Arc::clone(&neighbours);
        let emitter = Arc::clone(&emitter);
        tokio::spawn(async move {
            handle_probe_connection(stream, addr.ip(), &table, &neighbours, forward, probe_port, &emitter).await;
        });
    }
}

async fn handle_probe_connection(
    mut stream: TcpStream,
    sender_ip: IpAddr,
    table: &NeighbourTable,
    neighbours: &[IpAddr],
    forward: bool,
    probe_port: u16,
    emitter: &Arc<dyn EventEmitter>,
) {
    let mut buf = vec![0u8; MAX_TEXT_MESSAGE];
    let read = timeout(IO_TIMEOUT, stream.read(&mut buf)).await;
    let now = Instant::now();

    let parsed = match read {
        Ok(Ok(n)) if n > 0 => {
            let text = String::from_utf8_lossy(&buf[..n]).to_string();
            parse_probe_payload(&text).ok()
        }
        _ => None,
    };

    match parsed {
        Some((timestamp, catalogue)) => {
            let latency_ms = latency_ms_since(timestamp);
            table.record_probe(sender_ip, latency_ms, catalogue.clone(), now);
            emitter.emit_probe(ProbeEvent::Received {
                neighbour_ip: sender_ip.to_string(),
                latency_ms,
                timestamp: now_millis(),
            });

            if forward {
                forward_probe(sender_ip, probe_port, timestamp, &catalogue, neighbours, table).await;
            }
        }
        None => {
            table.record_probe(sender_ip, f64::INFINITY, vec!["NO_DATA".into()], now);
            emitter.emit_probe(ProbeEvent::Malformed {
                neighbour_ip: sender_ip.to_string(),
                timestamp: now_millis(),
            });
        }
    }

    let _ = stream.shutdown().await;
}

async fn forward_probe(
    sender_ip: IpAddr,
    probe_port: u16,
    original_timestamp: f64,
    catalogue: &[String],
    neighbours: &[IpAddr],
    table: &NeighbourTable,
) {
    let payload = format_probe_payload(original_timestamp, catalogue);
    let targets: Vec<IpAddr> = neighbours
        .iter()
        .copied()
        .filter(|ip| *ip != sender_ip)
        .collect();

    for ip in targets {
        if send_probe(ip, probe_port, &payload).await.is_err() {
            table.record_probe(ip, f64::INFINITY, Vec::new(), Instant::now());
        }
        tokio::time::sleep(PROBE_FORWARD_PACING).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_timestamp_and_catalogue() {
        let s = format_probe_payload(1000.5, &["clipA".into(), "clipB".into()]);
        assert_eq!(s, "1000.5,clipA,clipB");
    }

    #[test]
    fn formats_timestamp_with_empty_catalogue() {
        let s = format_probe_payload(1000.5, &[]);
        assert_eq!(s, "1000.5");
    }

    #[test]
    fn parses_timestamp_and_catalogue() {
        let (ts, cat) = parse_probe_payload("1000.5,clipA,clipB").unwrap();
        assert_eq!(ts, 1000.5);
        assert_eq!(cat, vec!["clipA".to_string(), "clipB".to_string()]);
    }

    #[test]
    fn malformed_payload_is_rejected() {
        assert!(parse_probe_payload("not,a,float,stuff").is_err());
    }

    #[test]
    fn splits_only_on_first_comma() {
        let (ts, cat) = parse_probe_payload("1.0,clipA,clip,with,commas").unwrap();
        assert_eq!(ts, 1.0);
        assert_eq!(cat, vec!["clipA", "clip", "with", "commas"]);
    }
}
