//! Time utilities for game simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 60; // 60 fixed sub-steps per second
pub const PATCH_TPS: u32 = 60; // 60 state patches per second
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / SIMULATION_TPS as u64;
pub const PATCH_INTERVAL_MICROS: u64 = 1_000_000 / PATCH_TPS as u64;

/// Fixed sub-step duration for physics (in seconds)
pub fn tick_delta() -> f32 {
    1.0 / SIMULATION_TPS as f32
}

/// Fixed sub-step duration in simulation milliseconds
pub fn tick_delta_ms() -> f64 {
    1000.0 / SIMULATION_TPS as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_and_patch_intervals_match_their_rates() {
        assert_eq!(TICK_DURATION_MICROS * SIMULATION_TPS as u64, 1_000_000);
        assert_eq!(PATCH_INTERVAL_MICROS * PATCH_TPS as u64, 1_000_000);
        assert!((tick_delta_ms() * SIMULATION_TPS as f64 - 1000.0).abs() < 1e-9);
    }
}
