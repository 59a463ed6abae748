//! Bridge implementation that maps domain events to a broadcast channel.
//!
//! The [`BroadcastEventBridge`] lives at the boundary between the routing
//! tasks and anything observing them (tests, an optional log sink), mapping
//! typed domain events onto a `tokio::sync::broadcast` channel.

use tokio::sync::broadcast;

use super::emitter::EventEmitter;
use super::{
    BroadcastEvent, DataplaneEvent, HeartbeatEvent, NetworkEvent, ProbeEvent, SubscriptionEvent,
    SwitchoverEvent,
};

/// Bridges domain events to a broadcast channel.
///
/// # Thread Safety
///
/// The bridge is `Send + Sync` and can be shared across async tasks.
#[derive(Clone)]
pub struct BroadcastEventBridge {
    tx: broadcast::Sender<BroadcastEvent>,
}

impl BroadcastEventBridge {
    /// Creates a new bridge with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Creates a new bridge wrapping an existing broadcast sender.
    pub fn with_sender(tx: broadcast::Sender<BroadcastEvent>) -> Self {
        Self { tx }
    }

    /// Returns a new receiver for the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.tx.subscribe()
    }

    /// Returns a reference to the broadcast sender.
    pub fn sender(&self) -> &broadcast::Sender<BroadcastEvent> {
        &self.tx
    }
}

/// Generates an [`EventEmitter`] method that sends to the broadcast channel.
macro_rules! impl_emit {
    ($method:ident, $event_ty:ty, $variant:ident) => {
        fn $method(&self, event: $event_ty) {
            if let Err(e) = self.tx.send(BroadcastEvent::$variant(event)) {
                log::trace!("[EventBridge] no broadcast receivers: {}", e);
            }
        }
    };
}

impl EventEmitter for BroadcastEventBridge {
    impl_emit!(emit_probe, ProbeEvent, Probe);
    impl_emit!(emit_subscription, SubscriptionEvent, Subscription);
    impl_emit!(emit_switchover, SwitchoverEvent, Switchover);
    impl_emit!(emit_heartbeat, HeartbeatEvent, Heartbeat);
    impl_emit!(emit_network, NetworkEvent, Network);
    impl_emit!(emit_dataplane, DataplaneEvent, Dataplane);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_delivers_to_subscriber() {
        let bridge = BroadcastEventBridge::new(8);
        let mut rx = bridge.subscribe();

        bridge.emit_heartbeat(HeartbeatEvent::DownstreamEvicted {
            downstream_ip: "10.0.0.9".into(),
            timestamp: 0,
        });

        let event = rx.try_recv().expect("event should be queued");
        assert!(matches!(event, BroadcastEvent::Heartbeat(_)));
    }
}
