//! Traffic accounting
//!
//! Cumulative up/down byte counters with delta sampling. The meter owns no
//! timer; each control-plane stream drives its own sampling cadence through a
//! private sampler.

mod stream;

pub use stream::MeteredStream;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Rolling byte counters for upstream and downstream traffic.
///
/// Totals are monotonic. Rate sampling state lives in [`TrafficSampler`], one
/// per consumer, so concurrent samplers report independent deltas.
#[derive(Debug, Default)]
pub struct TrafficMeter {
    up_total: AtomicU64,
    down_total: AtomicU64,
}

impl TrafficMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_up(&self, bytes: u64) {
        self.up_total.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_down(&self, bytes: u64) {
        self.down_total.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Cumulative (up, down) totals
    pub fn total(&self) -> (u64, u64) {
        (
            self.up_total.load(Ordering::Relaxed),
            self.down_total.load(Ordering::Relaxed),
        )
    }
}

/// Per-consumer delta sampler over a shared meter.
///
/// `delta` returns the bytes accumulated since the previous `delta` call on
/// this sampler (or since its creation), so one sampler polling once a second
/// sees per-second rates regardless of how many other samplers exist.
pub struct TrafficSampler {
    meter: Arc<TrafficMeter>,
    last_up: u64,
    last_down: u64,
}

impl TrafficSampler {
    pub fn new(meter: Arc<TrafficMeter>) -> Self {
        let (last_up, last_down) = meter.total();
        TrafficSampler {
            meter,
            last_up,
            last_down,
        }
    }

    /// (up, down) bytes accumulated since the previous `delta` call
    pub fn delta(&mut self) -> (u64, u64) {
        let (up, down) = self.meter.total();
        let result = (
            up.saturating_sub(self.last_up),
            down.saturating_sub(self.last_down),
        );
        self.last_up = up;
        self.last_down = down;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_are_cumulative() {
        let meter = TrafficMeter::new();
        meter.record_up(100);
        meter.record_down(200);
        meter.record_up(1);
        assert_eq!(meter.total(), (101, 200));
    }

    #[test]
    fn test_sampler_delta_resets_between_samples() {
        let meter = Arc::new(TrafficMeter::new());
        let mut sampler = TrafficSampler::new(meter.clone());

        meter.record_up(100);
        meter.record_down(50);

        assert_eq!(sampler.delta(), (100, 50));
        assert_eq!(sampler.delta(), (0, 0));

        meter.record_down(25);
        assert_eq!(sampler.delta(), (0, 25));
        // Totals unaffected by sampling
        assert_eq!(meter.total(), (100, 75));
    }

    #[test]
    fn test_concurrent_samplers_are_independent() {
        let meter = Arc::new(TrafficMeter::new());
        let mut a = TrafficSampler::new(meter.clone());
        let mut b = TrafficSampler::new(meter.clone());

        meter.record_up(100);
        meter.record_down(40);

        // Both consumers see the full rate, neither steals the other's sample
        assert_eq!(a.delta(), (100, 40));
        assert_eq!(b.delta(), (100, 40));

        meter.record_up(7);
        assert_eq!(b.delta(), (7, 0));
        assert_eq!(a.delta(), (7, 0));
    }

    #[test]
    fn test_sampler_starts_at_creation_point() {
        let meter = Arc::new(TrafficMeter::new());
        meter.record_up(500);

        let mut sampler = TrafficSampler::new(meter.clone());
        assert_eq!(sampler.delta(), (0, 0));

        meter.record_up(3);
        assert_eq!(sampler.delta(), (3, 0));
    }
}
