//! Per-connection latency monitoring
//!
//! Latency is sampled from the inter-arrival gaps of input messages rather
//! than a dedicated ping round-trip: clients send input at a fixed cadence, so
//! the gap between arrivals tracks one-way delay jitter closely enough for
//! timestamp correction.

/// Rolling latency estimate for one connection
#[derive(Debug)]
pub struct ClientStat {
    samples: Vec<f64>,
    max_samples: usize,
    last_avg_at: f64,
    avg_calc_interval_ms: f64,
    avg_ping: f64,
    prev_timestamp: f64,
}

impl ClientStat {
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
            max_samples: 100,
            last_avg_at: 0.0,
            avg_calc_interval_ms: 500.0,
            avg_ping: 0.0,
            prev_timestamp: 0.0,
        }
    }

    /// Record an arrival at `now` (server ms). Called once per received input
    /// message. The very first arrival has no prior timestamp to diff against
    /// and records a zero sample.
    pub fn ping(&mut self, now: f64) {
        let sample = if self.prev_timestamp != 0.0 {
            now - self.prev_timestamp
        } else {
            0.0
        };

        if self.samples.len() == self.max_samples {
            self.samples.remove(0);
        }
        self.samples.push(sample);
        self.prev_timestamp = now;

        // Recompute at most every 500ms so bursty arrivals don't thrash the estimate
        if now - self.last_avg_at > self.avg_calc_interval_ms {
            self.avg_ping = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
            self.last_avg_at = now;
        }
    }

    /// Last computed moving average (ms). Zero until enough time has passed
    /// for the first recomputation window.
    pub fn avg_ping(&self) -> f64 {
        self.avg_ping
    }
}

impl Default for ClientStat {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_has_no_prior_gap() {
        let mut stat = ClientStat::new();
        stat.ping(1000.0);
        // Only a single zero sample exists; whatever the recompute timing, the
        // average cannot be nonzero.
        assert_eq!(stat.avg_ping(), 0.0);
    }

    #[test]
    fn average_reflects_inter_arrival_gaps() {
        let mut stat = ClientStat::new();
        let mut now = 0.0;
        // 40ms cadence for two seconds
        for _ in 0..50 {
            now += 40.0;
            stat.ping(now);
        }
        // Recomputed at some point past 500ms; the steady-state gap is 40ms,
        // dragged down slightly by the initial zero sample.
        assert!(stat.avg_ping() > 30.0 && stat.avg_ping() <= 40.0);
    }

    #[test]
    fn recompute_is_throttled_to_the_interval() {
        let mut stat = ClientStat::new();
        stat.ping(0.0);
        stat.ping(600.0); // past interval: recompute happens here
        let after_first = stat.avg_ping();

        // Bursty arrivals inside the window must not change the estimate
        stat.ping(610.0);
        stat.ping(620.0);
        assert_eq!(stat.avg_ping(), after_first);

        // Next arrival beyond the window updates it
        stat.ping(1200.0);
        assert_ne!(stat.avg_ping(), after_first);
    }

    #[test]
    fn window_is_bounded_to_max_samples() {
        let mut stat = ClientStat::new();
        let mut now = 0.0;
        // 150 samples at a 100ms gap, then a long stretch of 10ms gaps; with a
        // bounded window of 100 the old gaps age out entirely.
        for _ in 0..150 {
            now += 100.0;
            stat.ping(now);
        }
        for _ in 0..100 {
            now += 10.0;
            stat.ping(now);
        }
        now += 600.0;
        stat.ping(now);
        assert!(stat.avg_ping() < 100.0);
    }
}
