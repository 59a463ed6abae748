//! Event system for observing overlay routing decisions.
//!
//! This module provides:
//! - [`EventEmitter`] trait for domain services to emit events
//! - Event types for each task family described in the concurrency model
//!
//! Events are consumed today by [`crate::events::bridge::BroadcastEventBridge`]
//! for log correlation and by tests that assert on routing behaviour; there is
//! no outward-facing transport (no HTTP/WS API in scope).

pub mod bridge;
mod emitter;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

/// Events emitted by a node's background tasks.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum BroadcastEvent {
    /// Events from the latency probe plane.
    Probe(ProbeEvent),
    /// Events from the subscription table / control plane.
    Subscription(SubscriptionEvent),
    /// Events from the upstream selector.
    Switchover(SwitchoverEvent),
    /// Events from the heartbeat sweep and emitter.
    Heartbeat(HeartbeatEvent),
    /// Network-health events.
    Network(NetworkEvent),
    /// Events from the data-plane fanout and client reassembler.
    Dataplane(DataplaneEvent),
}

/// Events from the latency probe plane (§4.1).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProbeEvent {
    /// A probe was received and recorded for a neighbour.
    Received {
        #[serde(rename = "neighbourIp")]
        neighbour_ip: String,
        #[serde(rename = "latencyMs")]
        latency_ms: f64,
        timestamp: u64,
    },
    /// A probe from this sender did not parse; latency was recorded as +inf.
    Malformed {
        #[serde(rename = "neighbourIp")]
        neighbour_ip: String,
        timestamp: u64,
    },
    /// A neighbour was evicted after exceeding `STALE_TIMEOUT`.
    Evicted {
        #[serde(rename = "neighbourIp")]
        neighbour_ip: String,
        timestamp: u64,
    },
}

/// Events from the subscription table and control-plane listener (§4.2).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SubscriptionEvent {
    /// A video transitioned from zero to one subscriber; an upstream
    /// START_STREAM was issued.
    VideoActivated { video: String, timestamp: u64 },
    /// A video's subscriber set became empty; an upstream STOP_STREAM was
    /// issued.
    VideoDeactivated { video: String, timestamp: u64 },
    /// A control message failed to parse and was discarded.
    MalformedCommand {
        #[serde(rename = "senderIp")]
        sender_ip: String,
        timestamp: u64,
    },
}

/// Events from the upstream selector / switchover task (§4.3).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SwitchoverEvent {
    /// The selector chose a different upstream than the one currently in use.
    UpstreamChanged {
        #[serde(rename = "oldUpstream")]
        old_upstream: Option<String>,
        #[serde(rename = "newUpstream")]
        new_upstream: String,
        #[serde(rename = "videoCount")]
        video_count: usize,
        timestamp: u64,
    },
}

/// Events from the heartbeat sweep and emitter tasks (§4.2/§4.3).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HeartbeatEvent {
    /// A downstream was evicted from every subscriber set after missing
    /// `HEARTBEAT_TIMEOUT`.
    DownstreamEvicted {
        #[serde(rename = "downstreamIp")]
        downstream_ip: String,
        timestamp: u64,
    },
}

/// Network health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum NetworkHealth {
    /// At least one neighbour has finite latency.
    #[default]
    Ok,
    /// Every known neighbour is stale or unreachable.
    Degraded,
}

/// Events related to overall node network health.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NetworkEvent {
    /// Network health status changed.
    HealthChanged {
        health: NetworkHealth,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        timestamp: u64,
    },
}

/// Events from the data-plane fanout and client-side reassembler (§4.4/§4.5).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DataplaneEvent {
    /// A relay dropped a chunk because its video had no subscribers.
    ChunkDroppedNoSubscribers { video: String, timestamp: u64 },
    /// A client finished reassembling a complete frame.
    FrameReassembled {
        video: String,
        #[serde(rename = "frameSize")]
        frame_size: u32,
        timestamp: u64,
    },
    /// A client discarded a partial frame because a new `frame_size` arrived
    /// mid-assembly (the source started a new frame before this one finished).
    FrameAbandoned {
        video: String,
        #[serde(rename = "bytesReceived")]
        bytes_received: usize,
        timestamp: u64,
    },
}

impl From<ProbeEvent> for BroadcastEvent {
    fn from(event: ProbeEvent) -> Self {
        BroadcastEvent::Probe(event)
    }
}

impl From<SubscriptionEvent> for BroadcastEvent {
    fn from(event: SubscriptionEvent) -> Self {
        BroadcastEvent::Subscription(event)
    }
}

impl From<SwitchoverEvent> for BroadcastEvent {
    fn from(event: SwitchoverEvent) -> Self {
        BroadcastEvent::Switchover(event)
    }
}

impl From<HeartbeatEvent> for BroadcastEvent {
    fn from(event: HeartbeatEvent) -> Self {
        BroadcastEvent::Heartbeat(event)
    }
}

impl From<NetworkEvent> for BroadcastEvent {
    fn from(event: NetworkEvent) -> Self {
        BroadcastEvent::Network(event)
    }
}

impl From<DataplaneEvent> for BroadcastEvent {
    fn from(event: DataplaneEvent) -> Self {
        BroadcastEvent::Dataplane(event)
    }
}
