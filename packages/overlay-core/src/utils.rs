//! General utilities shared across the overlay core.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch (shouldn't happen in practice).
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Returns the current Unix timestamp in fractional seconds, as carried on the wire
/// by latency probes and the client RPC response.
#[must_use]
pub fn now_unix_secs_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Computes a one-way latency in milliseconds from a sender-supplied wall-clock
/// timestamp, clamping negative values (caused by clock skew between nodes) to zero.
#[must_use]
pub fn latency_ms_since(sent_unix_secs: f64) -> f64 {
    let latency = (now_unix_secs_f64() - sent_unix_secs) * 1000.0;
    latency.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_is_clamped_to_zero_on_clock_skew() {
        let future = now_unix_secs_f64() + 5.0;
        assert_eq!(latency_ms_since(future), 0.0);
    }

    #[test]
    fn latency_of_recent_timestamp_is_small_and_nonnegative() {
        let now = now_unix_secs_f64();
        let latency = latency_ms_since(now);
        assert!((0.0..50.0).contains(&latency));
    }
}
