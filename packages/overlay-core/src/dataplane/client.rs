//! Client orchestrator: PoP probing, upstream reselection, frame
//! reassembly, and one-time catalogue pick (§4.5).

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::events::{DataplaneEvent, EventEmitter, SwitchoverEvent};
use crate::protocol_constants::{
    CLIENT_PROBE_INTERVAL, CLIENT_PROBE_MAX_ATTEMPTS, CLIENT_SELECTOR_INTERVAL, IO_TIMEOUT,
    MAX_DATAGRAM,
};
use crate::services::neighbour_table::NeighbourTable;
use crate::services::rpc::parse_rpc_response;
use crate::services::subscription::{send_control_command, ControlCommand};
use crate::services::switchover::UpstreamSession;
use crate::utils::now_millis;

const LATENCY_REQUEST: &str = "LATENCY_REQUEST";

/// Sends one `LATENCY_REQUEST` to `pop` and returns its parsed response.
/// A timeout or malformed response is treated identically: no data this
/// attempt, per §7 (transient faults just don't update the table).
async fn probe_pop_once(
    socket: &UdpSocket,
    pop: IpAddr,
    rpc_port: u16,
) -> Option<(f64, Vec<String>)> {
    socket
        .send_to(LATENCY_REQUEST.as_bytes(), (pop, rpc_port))
        .await
        .ok()?;
    let mut buf = [0u8; 1024];
    let (n, _) = timeout(IO_TIMEOUT, socket.recv_from(&mut buf)).await.ok()??;
    let text = String::from_utf8_lossy(&buf[..n]);
    let (latency_ms, _server_time, catalogue) = parse_rpc_response(&text)?;
    Some((latency_ms, catalogue))
}

/// Probes every known PoP up to `CLIENT_PROBE_MAX_ATTEMPTS` times, averaging
/// the successful latencies, and records the result in `table`.
async fn probe_round(socket: &UdpSocket, pops: &[IpAddr], rpc_port: u16, table: &NeighbourTable) {
    for &pop in pops {
        let mut successes = Vec::new();
        let mut catalogue = Vec::new();
        for _ in 0..CLIENT_PROBE_MAX_ATTEMPTS {
            if let Some((latency_ms, cat)) = probe_pop_once(socket, pop, rpc_port).await {
                successes.push(latency_ms);
                catalogue = cat;
            }
        }
        let latency_ms = if successes.is_empty() {
            f64::INFINITY
        } else {
            successes.iter().sum::<f64>() / successes.len() as f64
        };
        table.record_probe(pop, latency_ms, catalogue, Instant::now());
    }
}

/// Runs the client's PoP-probing loop: every `CLIENT_PROBE_INTERVAL`,
/// re-measures latency to every known PoP.
pub async fn run_client_probe_loop(
    socket: UdpSocket,
    pops: Vec<IpAddr>,
    rpc_port: u16,
    table: Arc<NeighbourTable>,
) {
    let mut interval = tokio::time::interval(CLIENT_PROBE_INTERVAL);
    loop {
        interval.tick().await;
        probe_round(&socket, &pops, rpc_port, &table).await;
    }
}

/// Runs the client's upstream-reselection task: every
/// `CLIENT_SELECTOR_INTERVAL`, switches `video` from the current PoP to a
/// better-scoring one if one exists (§4.5).
pub async fn run_client_selector_loop(
    table: Arc<NeighbourTable>,
    upstream: Arc<UpstreamSession>,
    video: String,
    control_port: u16,
    emitter: Arc<dyn EventEmitter>,
) {
    let mut interval = tokio::time::interval(CLIENT_SELECTOR_INTERVAL);
    loop {
        interval.tick().await;
        let Some((new_pop, _latency, _catalogue)) =
            table.best_upstream(Instant::now(), emitter.as_ref())
        else {
            continue;
        };
        let old_pop = upstream.current_ip();
        if old_pop == Some(new_pop) {
            continue;
        }

        if let Some(old) = old_pop {
            let cmd = ControlCommand::StopStream(video.clone());
            if let Err(e) = send_control_command(old, control_port, &cmd).await {
                log::warn!("client selector: failed to stop old PoP {old}: {e}");
            }
        }
        upstream.replace(new_pop);
        let cmd = ControlCommand::StartStream(video.clone());
        if let Err(e) = send_control_command(new_pop, control_port, &cmd).await {
            log::warn!("client selector: failed to start new PoP {new_pop}: {e}");
        }

        emitter.emit_switchover(SwitchoverEvent::UpstreamChanged {
            old_upstream: old_pop.map(|ip| ip.to_string()),
            new_upstream: new_pop.to_string(),
            video_count: 1,
            timestamp: now_millis(),
        });
    }
}

/// Accumulates chunks for one in-flight frame, keyed by `packet_id`.
///
/// There is no frame identifier on the wire; a change in `frame_size`
/// signals a new frame has started and the previous one is abandoned
/// (§4.4). Out-of-order chunks are tolerated since completion is judged by
/// accumulated byte length, not by packet_id contiguity.
#[derive(Default)]
struct FrameReassembler {
    frame_size: Option<u32>,
    chunks: BTreeMap<u16, Vec<u8>>,
    accumulated: usize,
}

impl FrameReassembler {
    /// Feeds one chunk in. Returns the completed frame bytes, in
    /// `packet_id` order, once `accumulated` reaches `frame_size`.
    fn push(&mut self, packet_id: u16, frame_size: u32, payload: &[u8]) -> Option<Vec<u8>> {
        if self.frame_size != Some(frame_size) {
            self.frame_size = Some(frame_size);
            self.chunks.clear();
            self.accumulated = 0;
        }

        if self.chunks.insert(packet_id, payload.to_vec()).is_none() {
            self.accumulated += payload.len();
        }

        if self.accumulated as u32 >= frame_size {
            let frame = self.chunks.values().flatten().copied().collect();
            self.chunks.clear();
            self.accumulated = 0;
            self.frame_size = None;
            Some(frame)
        } else {
            None
        }
    }
}

/// Runs the client frame receiver: reassembles chunks per video and emits a
/// [`DataplaneEvent::FrameReassembled`] each time a frame completes.
/// Frames are handed to `on_frame` for rendering (an external collaborator,
/// out of scope per §1).
///
/// Only datagrams whose source IP matches `upstream`'s currently-selected PoP
/// are accepted — after a switchover, a datagram still in flight from the
/// old PoP (or from anyone else) is dropped rather than reassembled, so a
/// stale source can't feed frames in during the old upstream's teardown
/// grace period.
pub async fn run_client_frame_receiver(
    socket: UdpSocket,
    upstream: Arc<UpstreamSession>,
    emitter: Arc<dyn EventEmitter>,
    mut on_frame: impl FnMut(&str, Vec<u8>) + Send,
) {
    use super::frame::decode_chunk;

    let mut reassemblers: std::collections::HashMap<String, FrameReassembler> =
        std::collections::HashMap::new();
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let (n, addr) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("client frame receiver recv failed: {e}");
                continue;
            }
        };
        if upstream.current_ip() != Some(addr.ip()) {
            continue;
        }
        let Some(decoded) = decode_chunk(&buf[..n]) else {
            continue;
        };
        let reassembler = reassemblers.entry(decoded.video_id.clone()).or_default();
        if let Some(frame) = reassembler.push(decoded.packet_id, decoded.frame_size, decoded.payload) {
            emitter.emit_dataplane(DataplaneEvent::FrameReassembled {
                video: decoded.video_id.clone(),
                frame_size: decoded.frame_size,
                timestamp: now_millis(),
            });
            on_frame(&decoded.video_id, frame);
        }
    }
}

/// One entry in a catalogue offered by a PoP during the interactive pick.
#[derive(Debug, Clone)]
pub struct CatalogueChoice {
    pub pop: IpAddr,
    pub videos: Vec<String>,
}

/// Probes `pops` in order until one returns a non-empty catalogue, per
/// §4.5 ("the first PoP that returns a non-empty catalogue prompts the
/// operator"). The interactive prompt itself is left to the caller — this
/// only resolves which PoP and catalogue to prompt with.
pub async fn first_pop_with_catalogue(
    socket: &UdpSocket,
    pops: &[IpAddr],
    rpc_port: u16,
) -> Option<CatalogueChoice> {
    for &pop in pops {
        if let Some((_latency, catalogue)) = probe_pop_once(socket, pop, rpc_port).await {
            if !catalogue.is_empty() {
                return Some(CatalogueChoice { pop, videos: catalogue });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembler_completes_frame_after_all_chunks_regardless_of_order() {
        let mut r = FrameReassembler::default();
        assert!(r.push(2, 9, &[7, 8, 9]).is_none());
        assert!(r.push(0, 9, &[1, 2, 3]).is_none());
        let frame = r.push(1, 9, &[4, 5, 6]).unwrap();
        assert_eq!(frame, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn reassembler_abandons_partial_frame_on_frame_size_change() {
        let mut r = FrameReassembler::default();
        assert!(r.push(0, 100, &[1, 2, 3]).is_none());
        // A new frame_size arrives before the first completed: the partial
        // buffer is discarded, not concatenated with the new one.
        assert!(r.push(0, 3, &[9, 9, 9]).is_some());
    }

    #[test]
    fn reassembler_ignores_duplicate_packet_id() {
        let mut r = FrameReassembler::default();
        assert!(r.push(0, 3, &[1, 2, 3]).is_some());
        let mut r2 = FrameReassembler::default();
        assert!(r2.push(0, 6, &[1, 2, 3]).is_none());
        // Re-delivering packet 0 must not double-count toward completion.
        assert!(r2.push(0, 6, &[1, 2, 3]).is_none());
        assert!(r2.push(1, 6, &[4, 5, 6]).is_some());
    }
}
