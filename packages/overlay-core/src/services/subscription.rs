//! VideoSubscriptionTable and the control-plane listener (§4.2).
//!
//! Control commands are short-lived TCP connections whose body is the
//! entire message; the listener reads until the peer closes the connection
//! rather than looking for a line terminator.

use std::net::IpAddr;
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::events::{EventEmitter, SubscriptionEvent};
use crate::protocol_constants::{IO_TIMEOUT, MAX_TEXT_MESSAGE};
use crate::services::switchover::UpstreamSession;
use crate::utils::now_millis;

/// A parsed control-plane command (§6 wire format).
///
/// `HEARTBEAT` is not one of these: it rides its own UDP port
/// (see [`crate::services::heartbeat`]) rather than the TCP control
/// channel, so that a busy control connection can never delay the liveness
/// signal (Open Question in DESIGN.md).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    StartStream(String),
    StopStream(String),
}

impl ControlCommand {
    /// Serialises back to the ASCII wire form.
    pub fn to_wire(&self) -> String {
        match self {
            Self::StartStream(video) => format!("START_STREAM {video}"),
            Self::StopStream(video) => format!("STOP_STREAM {video}"),
        }
    }
}

/// Parses a control command from its ASCII wire form.
pub fn parse_control_command(text: &str) -> Option<ControlCommand> {
    let text = text.trim();
    if let Some(video) = text.strip_prefix("START_STREAM ") {
        let video = video.trim();
        if video.is_empty() {
            return None;
        }
        return Some(ControlCommand::StartStream(video.to_string()));
    }
    if let Some(video) = text.strip_prefix("STOP_STREAM ") {
        let video = video.trim();
        if video.is_empty() {
            return None;
        }
        return Some(ControlCommand::StopStream(video.to_string()));
    }
    None
}

/// Sends a single control command over a fresh TCP connection, closing
/// immediately after the write. Best-effort: errors are returned for the
/// caller to log, never retried here.
pub async fn send_control_command(
    ip: IpAddr,
    port: u16,
    command: &ControlCommand,
) -> std::io::Result<()> {
    let mut stream = timeout(IO_TIMEOUT, TcpStream::connect((ip, port)))
        .await
        .map_err(|_| std::io::Error::from(std::io::ErrorKind::TimedOut))??;
    stream.write_all(command.to_wire().as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Mapping `video_name -> set<downstream IP>`.
///
/// Subscribers are keyed by IP alone: the streaming port is a fixed,
/// deployment-wide constant (§6), so there is no per-client ephemeral port
/// to disambiguate (see Open Question in DESIGN.md).
///
/// Invariant: an empty subscriber set is never left in the map — membership
/// of `video` in the table is exactly "this video has subscribers".
pub struct VideoSubscriptionTable {
    videos: DashMap<String, DashSet<IpAddr>>,
}

/// Outcome of a subscription mutation, used to decide whether to notify upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// No change in video activity (subscriber added/removed but set stayed non-empty).
    None,
    /// Video went from zero to one subscriber.
    Activated,
    /// Video went from one-or-more to zero subscribers.
    Deactivated,
}

impl VideoSubscriptionTable {
    pub fn new() -> Self {
        Self {
            videos: DashMap::new(),
        }
    }

    /// Adds `subscriber` to `video`'s set. Returns `Activated` if this was
    /// the first subscriber for the video.
    pub fn subscribe(&self, video: &str, subscriber: IpAddr) -> TransitionKind {
        let mut activated = false;
        self.videos
            .entry(video.to_string())
            .and_modify(|set| {
                set.insert(subscriber);
            })
            .or_insert_with(|| {
                activated = true;
                let set = DashSet::new();
                set.insert(subscriber);
                set
            });
        if activated {
            TransitionKind::Activated
        } else {
            TransitionKind::None
        }
    }

    /// Removes `subscriber` from `video`'s set. Returns `Deactivated` if the
    /// set became empty as a result, and removes the video key entirely.
    pub fn unsubscribe(&self, video: &str, subscriber: &IpAddr) -> TransitionKind {
        let became_empty = match self.videos.get(video) {
            Some(set) => {
                set.remove(subscriber);
                set.is_empty()
            }
            None => return TransitionKind::None,
        };
        if became_empty {
            self.videos.remove(video);
            TransitionKind::Deactivated
        } else {
            TransitionKind::None
        }
    }

    /// Removes `subscriber` from every video's set (heartbeat timeout path).
    /// Returns the videos that were deactivated as a result.
    pub fn unsubscribe_everywhere(&self, subscriber: &IpAddr) -> Vec<String> {
        let videos: Vec<String> = self.videos.iter().map(|e| e.key().clone()).collect();
        let mut deactivated = Vec::new();
        for video in videos {
            if self.unsubscribe(&video, subscriber) == TransitionKind::Deactivated {
                deactivated.push(video);
            }
        }
        deactivated
    }

    /// Snapshot of current subscribers for `video`, copied out before any
    /// fanout I/O (§5 discipline: never hold the table across a send).
    pub fn subscribers_snapshot(&self, video: &str) -> Vec<IpAddr> {
        self.videos
            .get(video)
            .map(|set| set.iter().map(|ip| *ip).collect())
            .unwrap_or_default()
    }

    pub fn has_subscribers(&self, video: &str) -> bool {
        self.videos.contains_key(video)
    }

    /// All videos currently subscribed by at least one downstream — this is
    /// exactly the set the switchover task must keep subscribed upstream.
    pub fn active_videos(&self) -> Vec<String> {
        self.videos.iter().map(|e| e.key().clone()).collect()
    }
}

impl Default for VideoSubscriptionTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the control-plane listener: accepts a connection, reads until the
/// peer closes, parses one command, mutates the subscription/heartbeat
/// tables, and — for subscription transitions — re-issues the command to
/// the current upstream.
pub async fn run_control_listener(
    listener: TcpListener,
    subscriptions: Arc<VideoSubscriptionTable>,
    upstream: Arc<UpstreamSession>,
    control_port: u16,
    emitter: Arc<dyn EventEmitter>,
) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("control listener accept failed: {e}");
                continue;
            }
        };
        let subscriptions = Arc::clone(&subscriptions);
        let upstream = Arc::clone(&upstream);
        let emitter = Arc::clone(&emitter);
        tokio::spawn(async move {
            handle_control_connection(
                stream,
                addr.ip(),
                &subscriptions,
                &upstream,
                control_port,
                &emitter,
            )
            .await;
        });
    }
}

async fn handle_control_connection(
    mut stream: TcpStream,
    sender_ip: IpAddr,
    subscriptions: &VideoSubscriptionTable,
    upstream: &UpstreamSession,
    control_port: u16,
    emitter: &Arc<dyn EventEmitter>,
) {
    let mut buf = Vec::with_capacity(MAX_TEXT_MESSAGE);
    let mut chunk = [0u8; MAX_TEXT_MESSAGE];
    loop {
        match timeout(IO_TIMEOUT, stream.read(&mut chunk)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() >= MAX_TEXT_MESSAGE {
                    break;
                }
            }
            _ => break,
        }
    }
    let _ = stream.shutdown().await;

    let text = String::from_utf8_lossy(&buf);
    let Some(command) = parse_control_command(&text) else {
        emitter.emit_subscription(SubscriptionEvent::MalformedCommand {
            sender_ip: sender_ip.to_string(),
            timestamp: now_millis(),
        });
        return;
    };

    match command {
        ControlCommand::StartStream(video) => {
            let transition = subscriptions.subscribe(&video, sender_ip);
            if transition == TransitionKind::Activated {
                emitter.emit_subscription(SubscriptionEvent::VideoActivated {
                    video: video.clone(),
                    timestamp: now_millis(),
                });
                if let Some(current) = upstream.current_ip() {
                    let cmd = ControlCommand::StartStream(video);
                    if let Err(e) = send_control_command(current, control_port, &cmd).await {
                        log::warn!("failed to send {cmd:?} to upstream {current}: {e}");
                    }
                }
            }
        }
        ControlCommand::StopStream(video) => {
            let transition = subscriptions.unsubscribe(&video, &sender_ip);
            if transition == TransitionKind::Deactivated {
                emitter.emit_subscription(SubscriptionEvent::VideoDeactivated {
                    video: video.clone(),
                    timestamp: now_millis(),
                });
                if let Some(current) = upstream.current_ip() {
                    let cmd = ControlCommand::StopStream(video);
                    if let Err(e) = send_control_command(current, control_port, &cmd).await {
                        log::warn!("failed to send {cmd:?} to upstream {current}: {e}");
                    }
                }
            }
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
    fn parses_all_command_variants() {
        assert_eq!(
            parse_control_command("START_STREAM clipA"),
            Some(ControlCommand::StartStream("clipA".into()))
        );
        assert_eq!(
            parse_control_command("STOP_STREAM clipA"),
            Some(ControlCommand::StopStream("clipA".into()))
        );
        assert_eq!(parse_control_command("HEARTBEAT"), None);
        assert_eq!(parse_control_command("GARBAGE"), None);
        assert_eq!(parse_control_command("START_STREAM "), None);
    }

    #[test]
    fn first_subscriber_activates_video() {
        let table = VideoSubscriptionTable::new();
        assert_eq!(table.subscribe("clipA", ip(1)), TransitionKind::Activated);
        assert_eq!(table.subscribe("clipA", ip(2)), TransitionKind::None);
        assert!(table.has_subscribers("clipA"));
    }

    #[test]
    fn last_unsubscribe_deactivates_and_removes_key() {
        let table = VideoSubscriptionTable::new();
        table.subscribe("clipA", ip(1));
        assert_eq!(
            table.unsubscribe("clipA", &ip(1)),
            TransitionKind::Deactivated
        );
        assert!(!table.has_subscribers("clipA"));
        assert!(table.subscribers_snapshot("clipA").is_empty());
    }

    #[test]
    fn unsubscribe_everywhere_deactivates_every_matching_video() {
        let table = VideoSubscriptionTable::new();
        table.subscribe("clipA", ip(1));
        table.subscribe("clipB", ip(1));
        table.subscribe("clipB", ip(2));

        let deactivated = table.unsubscribe_everywhere(&ip(1));
        assert_eq!(deactivated, vec!["clipA".to_string()]);
        assert!(!table.has_subscribers("clipA"));
        assert!(table.has_subscribers("clipB"));
    }
}
