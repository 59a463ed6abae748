//! Inbound data-plane path: demultiplex by video ID and fan out to local
//! subscribers (§4.4 "Inbound path", relay role).

use std::sync::Arc;

use tokio::net::UdpSocket;

use crate::events::{DataplaneEvent, EventEmitter};
use crate::protocol_constants::MAX_DATAGRAM;
use crate::services::subscription::VideoSubscriptionTable;
use crate::utils::now_millis;

use super::frame::peek_video_id;

/// Runs the relay demultiplexer/fanout loop on `socket`. Every inbound
/// datagram is routed by its first 16 bytes alone — the rest of the header
/// and payload are forwarded verbatim, unparsed, to each current subscriber
/// on `streaming_port` (must match end-to-end, §6).
///
/// Unknown video IDs are dropped silently (§7). A send failure to a given
/// subscriber removes it from that video's set opportunistically, mirroring
/// the origin path's behaviour (§4.4) rather than waiting for the heartbeat
/// sweep to notice.
pub async fn run_relay_fanout(
    socket: UdpSocket,
    subscriptions: Arc<VideoSubscriptionTable>,
    streaming_port: u16,
    emitter: Arc<dyn EventEmitter>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let n = match socket.recv_from(&mut buf).await {
            Ok((n, _addr)) => n,
            Err(e) => {
                log::warn!("relay fanout recv failed: {e}");
                continue;
            }
        };
        let datagram = &buf[..n];
        let Some(video) = peek_video_id(datagram) else {
            continue;
        };
        if !subscriptions.has_subscribers(&video) {
            emitter.emit_dataplane(DataplaneEvent::ChunkDroppedNoSubscribers {
                video,
                timestamp: now_millis(),
            });
            continue;
        }

        let targets = subscriptions.subscribers_snapshot(&video);
        for ip in targets {
            if let Err(e) = socket.send_to(datagram, (ip, streaming_port)).await {
                log::debug!("fanout send to {ip} failed, dropping subscriber: {e}");
                subscriptions.unsubscribe(&video, &ip);
            }
        }
    }
}
