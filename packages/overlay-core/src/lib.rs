//! Overlay Core - shared library for the live-video distribution overlay.
//!
//! This crate implements the dynamic overlay routing and multicast-fanout
//! plane used by origin, relay/PoP, and client nodes: latency-probe based
//! upstream scoring, hop-by-hop control-plane propagation of subscriptions,
//! per-video subscriber sets, and UDP frame demultiplexing/fanout. It is
//! designed to be shared by the node binary and any client orchestrator.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`runtime`]: Task spawning abstraction for async runtime independence
//! - [`events`]: Event system for observing routing decisions
//! - [`context`]: Network configuration and local-IP detection
//! - [`state`]: Node/client configuration and capability composition
//! - [`services`]: Per-node tables and tasks (probe plane, subscriptions,
//!   heartbeats, switchover, client RPC)
//! - [`dataplane`]: Frame wire codec, relay fanout, origin emission, client
//!   reassembly
//! - [`bootstrap`]: Composition root wiring a node's services and tasks
//! - [`bootstrap_client`]: Client for the external bootstrap neighbour query
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! The crate defines traits to decouple core logic from external
//! collaborators:
//!
//! - [`TaskSpawner`](runtime::TaskSpawner): Spawning background tasks
//! - [`EventEmitter`](events::EventEmitter): Emitting domain events
//! - [`IpDetector`](context::IpDetector): Local IP detection
//! - [`VideoSource`](dataplane::VideoSource): Per-video frame production
//!   (video decode + JPEG encode), an external collaborator

#![warn(clippy::all)]

pub mod bootstrap;
pub mod bootstrap_client;
pub mod context;
pub mod dataplane;
pub mod error;
pub mod events;
pub mod protocol_constants;
pub mod runtime;
pub mod services;
pub mod state;
pub mod utils;

// Re-export commonly used types at the crate root
pub use bootstrap::{bootstrap_node, resolve_neighbours, spawn_node_tasks, NodeServices, VideoSourceFactory};
pub use bootstrap_client::fetch_neighbours;
pub use context::{IpDetector, LocalIpDetector, NetworkContext, NetworkError};
pub use dataplane::{
    first_pop_with_catalogue, run_client_frame_receiver, run_client_probe_loop,
    run_client_selector_loop, CatalogueChoice, VideoSource,
};
pub use error::{ErrorCode, OverlayError, OverlayResult};
pub use events::{
    BroadcastEvent, BroadcastEventBridge, DataplaneEvent, EventEmitter, HeartbeatEvent,
    NetworkEvent, NetworkHealth, ProbeEvent, SubscriptionEvent, SwitchoverEvent,
};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use services::{HeartbeatTable, NeighbourScore, NeighbourTable, UpstreamSession, VideoSubscriptionTable};
pub use state::{ClientConfig, NodeCapabilities, NodeConfig};
pub use utils::{latency_ms_since, now_millis, now_unix_secs_f64};
