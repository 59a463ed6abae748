//! Overlay routing services.
//!
//! Each module here owns one or more of the per-node tasks described in the
//! concurrency model: the latency probe plane, the subscription table and
//! control-plane listener, the heartbeat tables, the upstream selector, and
//! the client-facing RPC responder.

pub mod heartbeat;
pub mod neighbour_table;
pub mod probe;
pub mod rpc;
pub mod subscription;
pub mod switchover;

pub use heartbeat::HeartbeatTable;
pub use neighbour_table::{NeighbourScore, NeighbourTable};
pub use subscription::VideoSubscriptionTable;
pub use switchover::UpstreamSession;
