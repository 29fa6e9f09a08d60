//! Time utilities for the arena tick clock

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
pub const TICKS_PER_SECOND: u64 = 20; // host world runs at 20 ticks per second
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / TICKS_PER_SECOND;

/// Convert whole seconds of simulated time to ticks
pub fn secs_to_ticks(secs: u64) -> u64 {
    secs.saturating_mul(TICKS_PER_SECOND)
}

/// Real-time length of one tick
pub fn tick_duration() -> Duration {
    Duration::from_micros(TICK_DURATION_MICROS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secs_to_ticks() {
        assert_eq!(secs_to_ticks(0), 0);
        assert_eq!(secs_to_ticks(5), 100);
        assert_eq!(secs_to_ticks(u64::MAX), u64::MAX);
    }

    #[test]
    fn test_tick_duration() {
        assert_eq!(tick_duration(), Duration::from_millis(50));
    }
}
