//! UpstreamSession and the upstream-selector / switchover task (§4.3).
//!
//! The switchover is intentionally not transactional: data-plane packets
//! from the old source may continue briefly, which is fine because the
//! demultiplexer routes by video ID, not by source (§4.4).

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::events::{EventEmitter, SwitchoverEvent};
use crate::protocol_constants::SELECTOR_INTERVAL;
use crate::services::neighbour_table::NeighbourTable;
use crate::services::subscription::{send_control_command, ControlCommand, VideoSubscriptionTable};
use crate::utils::now_millis;

/// Tracks the single upstream currently subscribed to on behalf of this node.
pub struct UpstreamSession {
    current: RwLock<Option<IpAddr>>,
}

impl UpstreamSession {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    pub fn current_ip(&self) -> Option<IpAddr> {
        *self.current.read()
    }

    /// Atomically replaces the current upstream, returning the previous one.
    pub fn replace(&self, new_ip: IpAddr) -> Option<IpAddr> {
        std::mem::replace(&mut *self.current.write(), Some(new_ip))
    }
}

impl Default for UpstreamSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the 0.1 Hz upstream selector. When the best-scoring neighbour
/// differs from the current upstream, re-points every active video:
/// STOP_STREAM to the old upstream, swap, START_STREAM to the new one.
pub async fn run_switchover_task(
    neighbours: Arc<NeighbourTable>,
    subscriptions: Arc<VideoSubscriptionTable>,
    upstream: Arc<UpstreamSession>,
    control_port: u16,
    emitter: Arc<dyn EventEmitter>,
) {
    let mut interval = tokio::time::interval(SELECTOR_INTERVAL);
    loop {
        interval.tick().await;
        let Some((new_ip, _latency, _catalogue)) =
            neighbours.best_upstream(Instant::now(), emitter.as_ref())
        else {
            continue;
        };
        if upstream.current_ip() == Some(new_ip) {
            continue;
        }

        let active_videos = subscriptions.active_videos();
        let old_ip = upstream.current_ip();

        if let Some(old) = old_ip {
            for video in &active_videos {
                let cmd = ControlCommand::StopStream(video.clone());
                if let Err(e) = send_control_command(old, control_port, &cmd).await {
                    log::warn!("switchover: failed to send {cmd:?} to old upstream {old}: {e}");
                }
            }
        }

        upstream.replace(new_ip);

        for video in &active_videos {
            let cmd = ControlCommand::StartStream(video.clone());
            if let Err(e) = send_control_command(new_ip, control_port, &cmd).await {
                log::warn!("switchover: failed to send {cmd:?} to new upstream {new_ip}: {e}");
            }
        }

        emitter.emit_switchover(SwitchoverEvent::UpstreamChanged {
            old_upstream: old_ip.map(|ip| ip.to_string()),
            new_upstream: new_ip.to_string(),
            video_count: active_videos.len(),
            timestamp: now_millis(),
        });
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
    fn replace_returns_previous_upstream() {
        let session = UpstreamSession::new();
        assert_eq!(session.replace(ip(1)), None);
        assert_eq!(session.replace(ip(2)), Some(ip(1)));
        assert_eq!(session.current_ip(), Some(ip(2)));
    }
}
