//! Node bootstrap and task wiring.
//!
//! This module contains the composition root - the single place where all
//! per-node tables and sockets are instantiated, and `spawn_node_tasks`,
//! which spawns exactly the tasks a node's [`NodeCapabilities`] call for
//! (§5: 12 task families, not every node runs all of them).

use std::net::IpAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::dataplane::{run_origin_emitter, run_relay_fanout, VideoSource};
use crate::error::{OverlayError, OverlayResult};
use crate::events::{BroadcastEvent, BroadcastEventBridge, EventEmitter};
use crate::services::heartbeat::{run_heartbeat_emitter, run_heartbeat_receiver, run_heartbeat_sweep};
use crate::services::neighbour_table::NeighbourTable;
use crate::services::probe::{run_probe_emitter_loop, run_probe_receiver};
use crate::services::rpc::run_rpc_responder;
use crate::services::subscription::run_control_listener;
use crate::services::switchover::run_switchover_task;
use crate::services::{HeartbeatTable, UpstreamSession, VideoSubscriptionTable};
use crate::state::NodeConfig;

/// Container for all of one node's bootstrapped services.
///
/// Holds every table and socket a node might need; which tasks actually run
/// against them is decided by [`spawn_node_tasks`] from `config.capabilities`.
#[derive(Clone)]
pub struct NodeServices {
    pub config: NodeConfig,
    pub neighbours: Arc<NeighbourTable>,
    pub subscriptions: Arc<VideoSubscriptionTable>,
    pub heartbeats: Arc<HeartbeatTable>,
    pub upstream: Arc<UpstreamSession>,
    pub broadcast_tx: broadcast::Sender<BroadcastEvent>,
    pub event_bridge: Arc<BroadcastEventBridge>,
    pub cancel_token: CancellationToken,
}

impl NodeServices {
    /// Emitter trait object, for callers that only need to emit events.
    pub fn emitter(&self) -> Arc<dyn EventEmitter> {
        Arc::clone(&self.event_bridge) as Arc<dyn EventEmitter>
    }

    /// Cancels every task spawned by [`spawn_node_tasks`] and waits briefly
    /// for in-flight sends to drain. There is no graceful shutdown protocol
    /// in the wire format itself (§5); this only stops local tasks.
    pub fn shutdown(&self) {
        log::info!("[bootstrap] cancelling node tasks");
        self.cancel_token.cancel();
    }
}

/// Wires up a node's tables, channels, and cancellation token.
///
/// This does not bind any sockets or spawn any tasks — see
/// [`spawn_node_tasks`] for that, which is split out so callers can bind
/// sockets (and fail fast on a busy port) before committing to run.
///
/// # Errors
/// Returns an error if `config` fails validation.
pub fn bootstrap_node(config: NodeConfig) -> OverlayResult<NodeServices> {
    config
        .validate()
        .map_err(OverlayError::Configuration)?;

    let (broadcast_tx, _) = broadcast::channel::<BroadcastEvent>(config.event_channel_capacity);
    let event_bridge = Arc::new(BroadcastEventBridge::with_sender(broadcast_tx.clone()));

    Ok(NodeServices {
        config,
        neighbours: Arc::new(NeighbourTable::new()),
        subscriptions: Arc::new(VideoSubscriptionTable::new()),
        heartbeats: Arc::new(HeartbeatTable::new()),
        upstream: Arc::new(UpstreamSession::new()),
        broadcast_tx,
        event_bridge,
        cancel_token: CancellationToken::new(),
    })
}

/// Per-catalogue-entry source factory, used to start an origin's per-video
/// frame emitters (§5 task 10). Supplied by the caller since frame
/// production is an external collaborator (§1).
pub type VideoSourceFactory = dyn Fn(&str) -> Box<dyn VideoSource> + Send + Sync;

/// Binds every socket `services.config.capabilities` calls for and spawns
/// the corresponding background tasks (§5). Universal tasks (heartbeat
/// sweep, heartbeat receiver, control listener) always run; the rest are
/// gated on capability flags.
///
/// # Errors
/// Returns an error if any required socket fails to bind.
pub async fn spawn_node_tasks(
    services: &NodeServices,
    source_factory: Option<Arc<VideoSourceFactory>>,
) -> OverlayResult<()> {
    let cfg = &services.config;
    let caps = cfg.capabilities;
    let emitter = services.emitter();

    // Universal: control-plane listener (START_STREAM / STOP_STREAM).
    let control_listener = bind_tcp(cfg.control_port).await?;
    tokio::spawn(run_control_listener(
        control_listener,
        Arc::clone(&services.subscriptions),
        Arc::clone(&services.upstream),
        cfg.control_port,
        Arc::clone(&emitter),
    ));

    // Universal: heartbeat ingress and sweep.
    let heartbeat_socket = bind_udp(cfg.heartbeat_port).await?;
    tokio::spawn(run_heartbeat_receiver(
        heartbeat_socket,
        Arc::clone(&services.heartbeats),
    ));
    tokio::spawn(run_heartbeat_sweep(
        Arc::clone(&services.heartbeats),
        Arc::clone(&services.subscriptions),
        Arc::clone(&services.upstream),
        cfg.control_port,
        Arc::clone(&emitter),
    ));

    // probe_emit: periodic probe emitter to static neighbours.
    if caps.probe_emit {
        tokio::spawn(run_probe_emitter_loop(
            cfg.neighbours.clone(),
            cfg.probe_port,
            cfg.catalogue.clone(),
            Arc::clone(&services.neighbours),
        ));
    }

    // probe_forward: probe listener, re-flooding to every other neighbour.
    if caps.probe_forward {
        let probe_listener = bind_tcp(cfg.probe_port).await?;
        tokio::spawn(run_probe_receiver(
            probe_listener,
            Arc::clone(&services.neighbours),
            cfg.neighbours.clone(),
            true,
            cfg.probe_port,
            Arc::clone(&emitter),
        ));
    }

    // has_upstream (== probe_forward): selector/switchover and upstream heartbeat emitter.
    if caps.has_upstream() {
        tokio::spawn(run_switchover_task(
            Arc::clone(&services.neighbours),
            Arc::clone(&services.subscriptions),
            Arc::clone(&services.upstream),
            cfg.control_port,
            Arc::clone(&emitter),
        ));
        let heartbeat_emit_socket = UdpSocket::bind(("0.0.0.0", 0))
            .await
            .map_err(|e| OverlayError::Io("bind heartbeat emitter socket", e))?;
        tokio::spawn(run_heartbeat_emitter(
            heartbeat_emit_socket,
            Arc::clone(&services.upstream),
            cfg.heartbeat_port,
        ));
    }

    // frame_emit: one emitter task per catalogue entry (origin only).
    if caps.frame_emit {
        let factory = source_factory.ok_or_else(|| {
            OverlayError::Configuration(
                "a node with frame_emit capability requires a VideoSourceFactory".into(),
            )
        })?;
        for video in &cfg.catalogue {
            let socket = UdpSocket::bind(("0.0.0.0", 0))
                .await
                .map_err(|e| OverlayError::Io("bind origin emitter socket", e))?;
            let source = factory(video);
            tokio::spawn(run_origin_emitter(
                video.clone(),
                source,
                Arc::clone(&services.subscriptions),
                socket,
                cfg.streaming_port,
            ));
        }
    }

    // frame_fanout: inbound demultiplex/fanout loop (relay only).
    if caps.frame_fanout {
        let streaming_socket = bind_udp(cfg.streaming_port).await?;
        tokio::spawn(run_relay_fanout(
            streaming_socket,
            Arc::clone(&services.subscriptions),
            cfg.streaming_port,
            Arc::clone(&emitter),
        ));
    }

    // client_rpc: LATENCY_REQUEST responder (PoP only).
    if caps.client_rpc {
        let rpc_socket = bind_udp(cfg.rpc_port).await?;
        tokio::spawn(run_rpc_responder(
            rpc_socket,
            Arc::clone(&services.neighbours),
            Arc::clone(&emitter),
        ));
    }

    Ok(())
}

async fn bind_tcp(port: u16) -> OverlayResult<TcpListener> {
    TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| OverlayError::Io("bind TCP listener", e))
}

async fn bind_udp(port: u16) -> OverlayResult<UdpSocket> {
    UdpSocket::bind(("0.0.0.0", port))
        .await
        .map_err(|e| OverlayError::Io("bind UDP socket", e))
}

/// Resolves a node's neighbour list, preferring an explicit `--ip` override
/// over a bootstrap-service query (§6 CLI).
pub async fn resolve_neighbours(
    explicit: Vec<IpAddr>,
    bootstrap_ip: Option<IpAddr>,
    bootstrap_port: u16,
) -> OverlayResult<Vec<IpAddr>> {
    if !explicit.is_empty() {
        return Ok(explicit);
    }
    let Some(bootstrap_ip) = bootstrap_ip else {
        return Err(OverlayError::Configuration(
            "no neighbours given and no bootstrap IP configured".into(),
        ));
    };
    crate::bootstrap_client::fetch_neighbours(
        bootstrap_ip,
        bootstrap_port,
        crate::protocol_constants::IO_TIMEOUT,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::NodeCapabilities;

    #[test]
    fn bootstrap_rejects_invalid_config() {
        let config = NodeConfig {
            capabilities: NodeCapabilities::origin(),
            ..NodeConfig::default()
        };
        assert!(bootstrap_node(config).is_err());
    }

    #[test]
    fn bootstrap_accepts_valid_relay_config() {
        let config = NodeConfig {
            capabilities: NodeCapabilities::relay(),
            neighbours: vec!["10.0.0.1".parse().unwrap()],
            ..NodeConfig::default()
        };
        assert!(bootstrap_node(config).is_ok());
    }

    #[tokio::test]
    async fn resolve_neighbours_prefers_explicit_list() {
        let explicit = vec!["10.0.0.9".parse().unwrap()];
        let resolved = resolve_neighbours(explicit.clone(), None, 12222).await.unwrap();
        assert_eq!(resolved, explicit);
    }

    #[tokio::test]
    async fn resolve_neighbours_fails_without_explicit_or_bootstrap() {
        assert!(resolve_neighbours(vec![], None, 12222).await.is_err());
    }
}
