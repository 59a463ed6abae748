//! Fixed protocol constants defined by the overlay wire format.
//!
//! These values are part of the on-the-wire contract between nodes; changing
//! them breaks interoperability with any node still running the old value.

use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Default ports
// ─────────────────────────────────────────────────────────────────────────────

/// Bootstrap neighbour-query service (external collaborator).
pub const BOOTSTRAP_PORT: u16 = 12222;
/// Streaming UDP datagrams, primary variant.
pub const STREAMING_PORT: u16 = 12345;
/// Streaming UDP datagrams, alternate variant (must match end-to-end).
pub const STREAMING_PORT_ALT: u16 = 12346;
/// Control channel: START_STREAM / STOP_STREAM (TCP). HEARTBEAT rides its
/// own UDP port instead (see [`HEARTBEAT_PORT`]).
pub const CONTROL_PORT: u16 = 13333;
/// Latency probes between nodes.
pub const LATENCY_PROBE_PORT: u16 = 13334;
/// Client <-> PoP latency / catalogue RPC (UDP).
pub const CLIENT_RPC_PORT: u16 = 13335;
/// Heartbeat ingress (UDP variant, selected per the Open Questions in DESIGN.md).
pub const HEARTBEAT_PORT: u16 = 22222;

// ─────────────────────────────────────────────────────────────────────────────
// Timeouts and cadences
// ─────────────────────────────────────────────────────────────────────────────

/// How long a NeighbourScore entry may go unrefreshed before it is treated as +inf.
pub const STALE_TIMEOUT: Duration = Duration::from_secs(15);
/// Interval between probe emissions from origins (and relays advertising upward).
pub const PROBE_INTERVAL: Duration = Duration::from_secs(10);
/// Pacing delay between forwarded-probe sends when flooding to neighbours.
pub const PROBE_FORWARD_PACING: Duration = Duration::from_secs(1);
/// Connect/read timeout applied to every outbound TCP operation.
pub const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a downstream may go without a HEARTBEAT before eviction.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(6);
/// Heartbeat sweep cadence (1 Hz).
pub const HEARTBEAT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
/// Heartbeat emission cadence to the current upstream (0.5 Hz).
pub const HEARTBEAT_EMIT_INTERVAL: Duration = Duration::from_secs(2);

/// Upstream-selector / switchover tick (0.1 Hz).
pub const SELECTOR_INTERVAL: Duration = Duration::from_secs(10);

/// Client probe cadence to each known PoP.
pub const CLIENT_PROBE_INTERVAL: Duration = Duration::from_secs(30);
/// Client upstream-reselection tick.
pub const CLIENT_SELECTOR_INTERVAL: Duration = Duration::from_secs(5);
/// Maximum probe attempts averaged per client selection round.
pub const CLIENT_PROBE_MAX_ATTEMPTS: u32 = 3;

// ─────────────────────────────────────────────────────────────────────────────
// Frame datagram wire layout
// ─────────────────────────────────────────────────────────────────────────────

/// Width of the ASCII, space-padded video-id field.
pub const VIDEO_ID_FIELD_LEN: usize = 16;
/// `packet_id: u16` + `frame_size: u32`, both big-endian.
pub const FRAME_SUBHEADER_LEN: usize = 2 + 4;
/// Total fixed header in front of every JPEG chunk.
pub const FRAME_HEADER_LEN: usize = VIDEO_ID_FIELD_LEN + FRAME_SUBHEADER_LEN;
/// Maximum UDP datagram size accepted on the streaming socket.
pub const MAX_DATAGRAM: usize = 60_000;
/// Maximum JPEG payload carried by a single chunk.
pub const MAX_CHUNK_PAYLOAD: usize = MAX_DATAGRAM - FRAME_HEADER_LEN;

/// Maximum size read from a probe / control / bootstrap connection.
pub const MAX_TEXT_MESSAGE: usize = 1024;

/// Application identity used in log lines.
pub const SERVICE_ID: &str = "overlay-node";
