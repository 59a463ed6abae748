//! Node configuration file format.
//!
//! Supports loading from YAML files with environment variable and CLI
//! overrides, converted into [`overlay_core::NodeConfig`] for bootstrap.

use std::net::IpAddr;
use std::path::Path;

use anyhow::{Context, Result};
use overlay_core::{NodeCapabilities, NodeConfig};
use serde::Deserialize;

/// A node's role, as named on the CLI / in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Origin,
    Relay,
    Pop,
}

impl From<Role> for NodeCapabilities {
    fn from(role: Role) -> Self {
        match role {
            Role::Origin => NodeCapabilities::origin(),
            Role::Relay => NodeCapabilities::relay(),
            Role::Pop => NodeCapabilities::pop(),
        }
    }
}

/// Node configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OverlayNodeFileConfig {
    /// This node's role.
    pub role: Role,

    /// Static neighbour IPs (origin's downstream-facing peers, or a
    /// relay/PoP's upstream candidates). Overridden by `--ip`.
    pub neighbours: Vec<IpAddr>,

    /// Bootstrap service IP, used to resolve `neighbours` when empty.
    /// Override: `OVERLAY_BOOTSTRAP_IP`
    pub bootstrap_ip: Option<IpAddr>,

    /// Video names this node's catalogue advertises (origin only).
    /// Override: `--video`
    pub catalogue: Vec<String>,

    pub control_port: u16,
    pub probe_port: u16,
    pub rpc_port: u16,
    pub heartbeat_port: u16,
    pub streaming_port: u16,
    pub bootstrap_port: u16,
}

impl Default for OverlayNodeFileConfig {
    fn default() -> Self {
        let defaults = NodeConfig::default();
        Self {
            role: Role::Relay,
            neighbours: Vec::new(),
            bootstrap_ip: None,
            catalogue: Vec::new(),
            control_port: defaults.control_port,
            probe_port: defaults.probe_port,
            rpc_port: defaults.rpc_port,
            heartbeat_port: defaults.heartbeat_port,
            streaming_port: defaults.streaming_port,
            bootstrap_port: defaults.bootstrap_port,
        }
    }
}

impl OverlayNodeFileConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("OVERLAY_BOOTSTRAP_IP") {
            if let Ok(ip) = val.parse() {
                self.bootstrap_ip = Some(ip);
            }
        }
        if let Ok(val) = std::env::var("OVERLAY_CONTROL_PORT") {
            if let Ok(port) = val.parse() {
                self.control_port = port;
            }
        }
    }

    /// Converts to overlay-core's [`NodeConfig`], given a resolved neighbour
    /// list (CLI/bootstrap resolution happens before this, since it's async).
    pub fn to_node_config(&self, neighbours: Vec<IpAddr>) -> NodeConfig {
        NodeConfig {
            capabilities: self.role.into(),
            control_port: self.control_port,
            probe_port: self.probe_port,
            rpc_port: self.rpc_port,
            heartbeat_port: self.heartbeat_port,
            streaming_port: self.streaming_port,
            bootstrap_port: self.bootstrap_port,
            neighbours,
            catalogue: self.catalogue.clone(),
            ..NodeConfig::default()
        }
    }
}
