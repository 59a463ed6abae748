//! Node and client configuration types.
//!
//! Provides [`NodeConfig`] (overlay node: origin, relay, or PoP, composed via
//! [`NodeCapabilities`]) and [`ClientConfig`] (end-client orchestrator).

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::protocol_constants::{
    BOOTSTRAP_PORT, CLIENT_RPC_PORT, CONTROL_PORT, HEARTBEAT_PORT, LATENCY_PROBE_PORT,
    STREAMING_PORT,
};

/// The capability set that composes a node's role (§9 Design Notes:
/// "origin / relay / PoP / client differ mainly in which tasks they spawn
/// and which tables they mutate... composed at construction time, not via
/// inheritance").
///
/// `probe_forward` doubles as "this node has an upstream to select": only a
/// node that forwards probes from its neighbours has a NeighbourScore table
/// worth selecting from; an origin is the top of its subtree and has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCapabilities {
    /// Runs the periodic probe emitter, advertising this node's catalogue
    /// to its static neighbour list (origin behaviour).
    pub probe_emit: bool,
    /// Runs the probe listener and re-floods received probes to every other
    /// neighbour (relay behaviour); implies this node has an upstream.
    pub probe_forward: bool,
    /// Runs a per-video origin frame emitter for each catalogue entry.
    pub frame_emit: bool,
    /// Runs the inbound data-plane demultiplexer/fanout loop.
    pub frame_fanout: bool,
    /// Serves the client-facing `LATENCY_REQUEST` RPC.
    pub client_rpc: bool,
}

impl NodeCapabilities {
    /// An origin: advertises its catalogue and emits frames for it. Has no
    /// upstream and never sees inbound data-plane traffic.
    pub fn origin() -> Self {
        Self {
            probe_emit: true,
            probe_forward: false,
            frame_emit: true,
            frame_fanout: false,
            client_rpc: false,
        }
    }

    /// A relay: forwards probes, selects an upstream, and fans out inbound
    /// frames to its own subscribers. Does not itself serve clients.
    pub fn relay() -> Self {
        Self {
            probe_emit: false,
            probe_forward: true,
            frame_emit: false,
            frame_fanout: true,
            client_rpc: false,
        }
    }

    /// A relay that additionally serves the client-facing RPC (a "PoP").
    pub fn pop() -> Self {
        Self {
            client_rpc: true,
            ..Self::relay()
        }
    }

    /// Whether this node maintains a NeighbourScore table and runs the
    /// upstream selector/switchover task and upstream heartbeat emitter.
    pub fn has_upstream(&self) -> bool {
        self.probe_forward
    }
}

/// Configuration for one overlay node (origin, relay, or PoP).
///
/// All fields have sensible defaults matching §6's default ports; callers
/// override via CLI flags or a YAML file (`--config`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    /// This node's role composition.
    pub capabilities: NodeCapabilities,

    /// Control channel: START_STREAM / STOP_STREAM.
    pub control_port: u16,
    /// Latency probes between nodes.
    pub probe_port: u16,
    /// Client <-> PoP latency / catalogue RPC.
    pub rpc_port: u16,
    /// Heartbeat ingress (UDP).
    pub heartbeat_port: u16,
    /// Streaming UDP datagrams.
    pub streaming_port: u16,
    /// Bootstrap neighbour-query service.
    pub bootstrap_port: u16,

    /// Static neighbour IPs this node probes (origin) or accepts probes
    /// from and forwards to (relay). Populated from the bootstrap reply or
    /// `--ip` overrides.
    #[serde(default)]
    pub neighbours: Vec<IpAddr>,

    /// Video names this node's catalogue advertises. For an origin this is
    /// the set of loaded video files; for a relay it is informational only
    /// (the relay's real catalogue is whatever it last heard via probes).
    #[serde(default)]
    pub catalogue: Vec<String>,

    /// Capacity of the internal event broadcast channel.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_event_channel_capacity() -> usize {
    256
}

impl NodeConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns an error if an origin has no catalogue, or a capability that
    /// requires neighbours (`probe_emit` or `probe_forward`) has none.
    pub fn validate(&self) -> Result<(), String> {
        if self.capabilities.frame_emit && self.catalogue.is_empty() {
            return Err("an origin node must configure at least one catalogue entry".to_string());
        }
        if (self.capabilities.probe_emit || self.capabilities.probe_forward)
            && self.neighbours.is_empty()
        {
            return Err("a node that emits or forwards probes needs at least one neighbour".to_string());
        }
        if self.event_channel_capacity == 0 {
            return Err("event_channel_capacity must be >= 1 (broadcast::channel panics on 0)".to_string());
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            capabilities: NodeCapabilities::relay(),
            control_port: CONTROL_PORT,
            probe_port: LATENCY_PROBE_PORT,
            rpc_port: CLIENT_RPC_PORT,
            heartbeat_port: HEARTBEAT_PORT,
            streaming_port: STREAMING_PORT,
            bootstrap_port: BOOTSTRAP_PORT,
            neighbours: Vec::new(),
            catalogue: Vec::new(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Configuration for the end-client orchestrator (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// PoP IPs to probe; the client latches onto whichever scores best.
    pub pops: Vec<IpAddr>,
    /// Control channel on each PoP.
    pub control_port: u16,
    /// Client-facing RPC port on each PoP.
    pub rpc_port: u16,
    /// Heartbeat destination port on the current PoP.
    pub heartbeat_port: u16,
    /// Local port the client binds to receive frame datagrams on.
    pub streaming_port: u16,
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.pops.is_empty() {
            return Err("a client needs at least one PoP IP (--ip)".to_string());
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            pops: Vec::new(),
            control_port: CONTROL_PORT,
            rpc_port: CLIENT_RPC_PORT,
            heartbeat_port: HEARTBEAT_PORT,
            streaming_port: STREAMING_PORT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_without_catalogue_fails_validation() {
        let config = NodeConfig {
            capabilities: NodeCapabilities::origin(),
            neighbours: vec!["10.0.0.1".parse().unwrap()],
            ..NodeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn origin_with_catalogue_and_neighbour_is_valid() {
        let config = NodeConfig {
            capabilities: NodeCapabilities::origin(),
            neighbours: vec!["10.0.0.1".parse().unwrap()],
            catalogue: vec!["clipA".into()],
            ..NodeConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn relay_without_neighbours_fails_validation() {
        let config = NodeConfig {
            capabilities: NodeCapabilities::relay(),
            ..NodeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn pop_capabilities_include_client_rpc_and_upstream() {
        let caps = NodeCapabilities::pop();
        assert!(caps.client_rpc);
        assert!(caps.has_upstream());
    }

    #[test]
    fn client_config_requires_at_least_one_pop() {
        assert!(ClientConfig::default().validate().is_err());
    }
}
