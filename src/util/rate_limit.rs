//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::ws::protocol::HostEvent;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Movement and surface reports per second (a full server is chatty)
pub const BRIDGE_EVENT_RATE_LIMIT: u32 = 2_000;

/// Per-connection rate limiter state. Only high-volume events count
/// against the quota; deaths, quits and world mutations always pass.
#[derive(Clone)]
pub struct BridgeRateLimiter {
    event_limiter: Arc<Limiter>,
}

impl BridgeRateLimiter {
    pub fn new() -> Self {
        Self::with_rate(BRIDGE_EVENT_RATE_LIMIT)
    }

    pub fn with_rate(events_per_second: u32) -> Self {
        Self {
            event_limiter: create_limiter(events_per_second),
        }
    }

    /// Check if an inbound event is allowed (returns true if allowed)
    pub fn admit(&self, event: &HostEvent) -> bool {
        !event.is_high_volume() || self.check_event()
    }

    fn check_event(&self) -> bool {
        self.event_limiter.check().is_ok()
    }
}

impl Default for BridgeRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Position;
    use uuid::Uuid;

    fn moved(participant: Uuid) -> HostEvent {
        HostEvent::Moved {
            participant,
            position: Position::new("world", 1.0, 64.0, 1.0),
        }
    }

    #[test]
    fn test_burst_is_capped() {
        let limiter = BridgeRateLimiter::with_rate(3);
        let allowed = (0..10).filter(|_| limiter.check_event()).count();
        assert_eq!(allowed, 3);
    }

    #[test]
    fn test_zero_rate_still_allows_one() {
        let limiter = BridgeRateLimiter::with_rate(0);
        assert!(limiter.check_event());
    }

    #[test]
    fn test_only_high_volume_events_are_limited() {
        let limiter = BridgeRateLimiter::with_rate(1);
        let id = Uuid::new_v4();

        assert!(limiter.admit(&moved(id)));
        assert!(!limiter.admit(&moved(id)));
        assert!(!limiter.admit(&HostEvent::Surface {
            world: "world".to_string(),
            x: 0,
            z: 0,
            surface: crate::host::Surface {
                y: 65.0,
                feet: crate::host::Terrain::Air,
                below: crate::host::Terrain::Solid,
                head: crate::host::Terrain::Air,
            },
        }));

        assert!(limiter.admit(&HostEvent::Died { participant: id }));
        assert!(limiter.admit(&HostEvent::Quit { participant: id }));
        assert!(limiter.admit(&HostEvent::JoinMatch {
            participant: id,
            match_id: None,
        }));
        assert!(limiter.admit(&HostEvent::WorldMutation {
            actor: Some(id),
            position: crate::host::BlockPos {
                world: "world".to_string(),
                x: 0,
                y: 64,
                z: 0,
            },
            original: crate::host::BlockSnapshot {
                material: "STONE".to_string(),
                data: None,
                tile: None,
            },
        }));
    }
}
