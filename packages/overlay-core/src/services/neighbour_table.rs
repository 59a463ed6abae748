//! NeighbourScore table: per-neighbour latency, catalogue, and staleness (§3, §4.1).
//!
//! Mutated only by the probe-receive path; read by the upstream selector.
//! Staleness is tracked against a monotonic clock — wall-clock is reserved
//! for the wire payload that carries the sender's probe timestamp.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;

use crate::events::{EventEmitter, ProbeEvent};
use crate::protocol_constants::STALE_TIMEOUT;
use crate::utils::now_millis;

/// One known upstream neighbour's latest probe result.
#[derive(Debug, Clone)]
pub struct NeighbourScore {
    pub ip: IpAddr,
    /// Finite in milliseconds, or `f64::INFINITY` for a stale/unreachable/malformed neighbour.
    pub latency_ms: f64,
    /// Ordered list of video names this neighbour advertised on its last probe.
    pub advertised_catalogue: Vec<String>,
    last_update: Instant,
    /// Monotonic insertion order, used to break ties on first-seen (§4.1).
    first_seen_seq: u64,
}

impl NeighbourScore {
    fn is_stale(&self, now: Instant, timeout: std::time::Duration) -> bool {
        now.saturating_duration_since(self.last_update) > timeout
    }
}

/// Concurrent map of `ip -> NeighbourScore`.
///
/// A single struct guards all neighbour state for a node; callers copy the
/// fields they need out of a `DashMap` guard before doing any I/O, per the
/// node's "no blocking I/O under a table lock" discipline.
pub struct NeighbourTable {
    entries: DashMap<IpAddr, NeighbourScore>,
    seq: AtomicU64,
}

impl NeighbourTable {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            seq: AtomicU64::new(0),
        }
    }

    /// Records a probe result for `ip`, creating the entry on first contact.
    /// Returns `true` if this is a newly-seen neighbour.
    pub fn record_probe(
        &self,
        ip: IpAddr,
        latency_ms: f64,
        catalogue: Vec<String>,
        now: Instant,
    ) -> bool {
        let mut is_new = false;
        self.entries
            .entry(ip)
            .and_modify(|e| {
                e.latency_ms = latency_ms;
                e.advertised_catalogue = catalogue.clone();
                e.last_update = now;
            })
            .or_insert_with(|| {
                is_new = true;
                NeighbourScore {
                    ip,
                    latency_ms,
                    advertised_catalogue: catalogue,
                    last_update: now,
                    first_seen_seq: self.seq.fetch_add(1, Ordering::Relaxed),
                }
            });
        is_new
    }

    /// Removes every entry whose `last_update` is older than `STALE_TIMEOUT`.
    /// Returns the evicted IPs for event reporting.
    pub fn sweep_stale(&self, now: Instant) -> Vec<IpAddr> {
        self.sweep_stale_with_timeout(now, STALE_TIMEOUT)
    }

    pub fn sweep_stale_with_timeout(
        &self,
        now: Instant,
        timeout: std::time::Duration,
    ) -> Vec<IpAddr> {
        let stale: Vec<IpAddr> = self
            .entries
            .iter()
            .filter(|e| e.is_stale(now, timeout))
            .map(|e| *e.key())
            .collect();
        for ip in &stale {
            self.entries.remove(ip);
        }
        stale
    }

    /// Best upstream by `argmin(latency_ms)`, ties broken by first-seen order.
    /// Performs the staleness sweep first, per the lazy-sweep design, and
    /// reports each eviction via `emitter`.
    pub fn best_upstream(
        &self,
        now: Instant,
        emitter: &dyn EventEmitter,
    ) -> Option<(IpAddr, f64, Vec<String>)> {
        for ip in self.sweep_stale(now) {
            emitter.emit_probe(ProbeEvent::Evicted {
                neighbour_ip: ip.to_string(),
                timestamp: now_millis(),
            });
        }
        self.entries
            .iter()
            .filter(|e| e.latency_ms.is_finite())
            .min_by(|a, b| {
                a.latency_ms
                    .partial_cmp(&b.latency_ms)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.first_seen_seq.cmp(&b.first_seen_seq))
            })
            .map(|e| (e.ip, e.latency_ms, e.advertised_catalogue.clone()))
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.entries.contains_key(ip)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for NeighbourTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopEventEmitter;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn ip(n: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, n))
    }

    #[test]
    fn best_upstream_picks_lowest_latency() {
        let table = NeighbourTable::new();
        let now = Instant::now();
        table.record_probe(ip(1), 200.0, vec!["clipA".into()], now);
        table.record_probe(ip(2), 10.0, vec!["clipA".into()], now);

        let (best, latency, _) = table.best_upstream(now, &NoopEventEmitter).unwrap();
        assert_eq!(best, ip(2));
        assert_eq!(latency, 10.0);
    }

    #[test]
    fn ties_broken_by_first_seen() {
        let table = NeighbourTable::new();
        let now = Instant::now();
        table.record_probe(ip(1), 50.0, vec![], now);
        table.record_probe(ip(2), 50.0, vec![], now);

        let (best, _, _) = table.best_upstream(now, &NoopEventEmitter).unwrap();
        assert_eq!(best, ip(1));
    }

    #[test]
    fn stale_neighbour_is_excluded_and_evicted() {
        let table = NeighbourTable::new();
        let t0 = Instant::now();
        table.record_probe(ip(1), 10.0, vec![], t0);

        let later = t0 + Duration::from_secs(20);
        assert!(table.best_upstream(later, &NoopEventEmitter).is_none());
        assert!(!table.contains(&ip(1)));
    }

    #[test]
    fn record_probe_reports_whether_neighbour_is_new() {
        let table = NeighbourTable::new();
        let now = Instant::now();
        assert!(table.record_probe(ip(1), 10.0, vec![], now));
        assert!(!table.record_probe(ip(1), 12.0, vec![], now));
    }
}
