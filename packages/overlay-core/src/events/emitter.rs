//! Event emitter abstraction for decoupling services from transport.
//!
//! Services depend on the [`EventEmitter`] trait rather than a concrete
//! broadcast channel, which keeps the probe/subscription/switchover/heartbeat
//! tasks testable without a live socket.

use super::{
    DataplaneEvent, HeartbeatEvent, NetworkEvent, ProbeEvent, SubscriptionEvent, SwitchoverEvent,
};

/// Trait for emitting domain events without knowledge of transport.
pub trait EventEmitter: Send + Sync {
    /// Emits a latency probe plane event.
    fn emit_probe(&self, event: ProbeEvent);

    /// Emits a subscription table / control-plane event.
    fn emit_subscription(&self, event: SubscriptionEvent);

    /// Emits an upstream-switchover event.
    fn emit_switchover(&self, event: SwitchoverEvent);

    /// Emits a heartbeat sweep/emit event.
    fn emit_heartbeat(&self, event: HeartbeatEvent);

    /// Emits a network-health event.
    fn emit_network(&self, event: NetworkEvent);

    /// Emits a data-plane fanout/reassembly event.
    fn emit_dataplane(&self, event: DataplaneEvent);
}

/// No-op emitter for tests that don't assert on events.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_probe(&self, _event: ProbeEvent) {}
    fn emit_subscription(&self, _event: SubscriptionEvent) {}
    fn emit_switchover(&self, _event: SwitchoverEvent) {}
    fn emit_heartbeat(&self, _event: HeartbeatEvent) {}
    fn emit_network(&self, _event: NetworkEvent) {}
    fn emit_dataplane(&self, _event: DataplaneEvent) {}
}

/// Logging emitter for debugging and development.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_probe(&self, event: ProbeEvent) {
        tracing::debug!(?event, "probe_event");
    }

    fn emit_subscription(&self, event: SubscriptionEvent) {
        tracing::debug!(?event, "subscription_event");
    }

    fn emit_switchover(&self, event: SwitchoverEvent) {
        tracing::debug!(?event, "switchover_event");
    }

    fn emit_heartbeat(&self, event: HeartbeatEvent) {
        tracing::debug!(?event, "heartbeat_event");
    }

    fn emit_network(&self, event: NetworkEvent) {
        tracing::debug!(?event, "network_event");
    }

    fn emit_dataplane(&self, event: DataplaneEvent) {
        tracing::debug!(?event, "dataplane_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingEventEmitter {
        probe_count: AtomicUsize,
        switchover_count: AtomicUsize,
    }

    impl CountingEventEmitter {
        fn new() -> Self {
            Self {
                probe_count: AtomicUsize::new(0),
                switchover_count: AtomicUsize::new(0),
            }
        }
    }

    impl EventEmitter for CountingEventEmitter {
        fn emit_probe(&self, _event: ProbeEvent) {
            self.probe_count.fetch_add(1, Ordering::SeqCst);
        }
        fn emit_subscription(&self, _event: SubscriptionEvent) {}
        fn emit_switchover(&self, _event: SwitchoverEvent) {
            self.switchover_count.fetch_add(1, Ordering::SeqCst);
        }
        fn emit_heartbeat(&self, _event: HeartbeatEvent) {}
        fn emit_network(&self, _event: NetworkEvent) {}
        fn emit_dataplane(&self, _event: DataplaneEvent) {}
    }

    #[test]
    fn counting_emitter_tracks_events() {
        let emitter = Arc::new(CountingEventEmitter::new());

        emitter.emit_probe(ProbeEvent::Received {
            neighbour_ip: "10.0.0.1".into(),
            latency_ms: 12.5,
            timestamp: 0,
        });
        emitter.emit_probe(ProbeEvent::Evicted {
            neighbour_ip: "10.0.0.2".into(),
            timestamp: 0,
        });
        emitter.emit_switchover(SwitchoverEvent::UpstreamChanged {
            old_upstream: None,
            new_upstream: "10.0.0.1".into(),
            video_count: 1,
            timestamp: 0,
        });

        assert_eq!(emitter.probe_count.load(Ordering::SeqCst), 2);
        assert_eq!(emitter.switchover_count.load(Ordering::SeqCst), 1);
    }
}
