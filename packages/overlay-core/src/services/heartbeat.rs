//! HeartbeatTable, the 1 Hz sweep task, and the 0.5 Hz heartbeat emitter (§4.2/§4.3).

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::net::UdpSocket;

use crate::events::{EventEmitter, HeartbeatEvent};
use crate::protocol_constants::{
    HEARTBEAT_EMIT_INTERVAL, HEARTBEAT_SWEEP_INTERVAL, HEARTBEAT_TIMEOUT, MAX_TEXT_MESSAGE,
};
use crate::services::subscription::{send_control_command, ControlCommand, VideoSubscriptionTable};
use crate::services::switchover::UpstreamSession;
use crate::utils::now_millis;

/// Wire text for a heartbeat datagram. Heartbeats use their own UDP port
/// rather than the TCP control channel, so a busy control connection can
/// never delay the liveness signal (Open Question in DESIGN.md).
const HEARTBEAT_TEXT: &str = "HEARTBEAT";

/// Mapping `downstream_ip -> last_heartbeat_time`.
pub struct HeartbeatTable {
    last_seen: DashMap<IpAddr, Instant>,
}

impl HeartbeatTable {
    pub fn new() -> Self {
        Self {
            last_seen: DashMap::new(),
        }
    }

    pub fn touch(&self, ip: IpAddr, now: Instant) {
        self.last_seen.insert(ip, now);
    }

    /// Returns every IP whose last heartbeat predates `now - timeout`,
    /// removing them from the table.
    pub fn sweep_expired(&self, now: Instant, timeout: Duration) -> Vec<IpAddr> {
        let expired: Vec<IpAddr> = self
            .last_seen
            .iter()
            .filter(|e| now.saturating_duration_since(*e.value()) > timeout)
            .map(|e| *e.key())
            .collect();
        for ip in &expired {
            self.last_seen.remove(ip);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }
}

impl Default for HeartbeatTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the 1 Hz sweep: any downstream that missed `HEARTBEAT_TIMEOUT` is
/// removed from every video's subscriber set, as if it had sent STOP_STREAM
/// for each one; a STOP_STREAM is forwarded upstream for any video that
/// empties as a result.
pub async fn run_heartbeat_sweep(
    heartbeats: Arc<HeartbeatTable>,
    subscriptions: Arc<VideoSubscriptionTable>,
    upstream: Arc<UpstreamSession>,
    control_port: u16,
    emitter: Arc<dyn EventEmitter>,
) {
    let mut interval = tokio::time::interval(HEARTBEAT_SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        let expired = heartbeats.sweep_expired(Instant::now(), HEARTBEAT_TIMEOUT);
        for ip in expired {
            let deactivated = subscriptions.unsubscribe_everywhere(&ip);
            emitter.emit_heartbeat(HeartbeatEvent::DownstreamEvicted {
                downstream_ip: ip.to_string(),
                timestamp: now_millis(),
            });
            if let Some(current) = upstream.current_ip() {
                for video in deactivated {
                    let cmd = ControlCommand::StopStream(video);
                    if let Err(e) = send_control_command(current, control_port, &cmd).await {
                        log::warn!(
                            "heartbeat eviction: failed to send {cmd:?} to upstream {current}: {e}"
                        );
                    }
                }
            }
        }
    }
}

/// Runs the 0.5 Hz heartbeat emitter: sends a `HEARTBEAT` datagram to the
/// current upstream's heartbeat port over `socket`. UDP keeps the signal
/// connectionless so a stalled upstream never blocks the emitter task.
pub async fn run_heartbeat_emitter(
    socket: UdpSocket,
    upstream: Arc<UpstreamSession>,
    heartbeat_port: u16,
) {
    let mut interval = tokio::time::interval(HEARTBEAT_EMIT_INTERVAL);
    loop {
        interval.tick().await;
        if let Some(current) = upstream.current_ip() {
            if let Err(e) = socket
                .send_to(HEARTBEAT_TEXT.as_bytes(), (current, heartbeat_port))
                .await
            {
                log::debug!("heartbeat to {current} failed: {e}");
            }
        }
    }
}

/// Runs the heartbeat receiver: any `HEARTBEAT` datagram refreshes the
/// sender's entry in `heartbeats`. Anything else is dropped silently.
pub async fn run_heartbeat_receiver(socket: UdpSocket, heartbeats: Arc<HeartbeatTable>) {
    let mut buf = [0u8; MAX_TEXT_MESSAGE];
    loop {
        let (n, sender) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("heartbeat receiver recv failed: {e}");
                continue;
            }
        };
        if String::from_utf8_lossy(&buf[..n]).trim() == HEARTBEAT_TEXT {
            heartbeats.touch(sender.ip(), Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(n: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, n))
    }

    #[test]
    fn sweep_expires_only_stale_entries() {
        let table = HeartbeatTable::new();
        let t0 = Instant::now();
        table.touch(ip(1), t0);
        table.touch(ip(2), t0 + Duration::from_secs(5));

        let later = t0 + Duration::from_secs(7);
        let expired = table.sweep_expired(later, HEARTBEAT_TIMEOUT);

        assert_eq!(expired, vec![ip(1)]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn fresh_heartbeat_is_not_expired() {
        let table = HeartbeatTable::new();
        let now = Instant::now();
        table.touch(ip(1), now);
        assert!(table.sweep_expired(now, HEARTBEAT_TIMEOUT).is_empty());
    }
}
