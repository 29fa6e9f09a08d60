//! Random safe landing spots inside the arena

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::config::SafeTeleportSettings;
use crate::host::{LocationService, Position, Surface, Terrain};

use super::Arena;

/// Chosen landing position
#[derive(Debug, Clone, PartialEq)]
pub struct LandingSpot {
    pub position: Position,
    /// No safe column was found and the arena center was used instead
    pub fallback: bool,
}

pub struct SafeSpotFinder {
    rng: ChaCha8Rng,
}

impl SafeSpotFinder {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self::new(rand::random::<u64>())
    }

    /// Pick a random safe column in the arena, within a bounded number of
    /// attempts, falling back to the arena center. Returns `None` if the
    /// arena is not defined.
    pub fn find<L: LocationService + ?Sized>(
        &mut self,
        arena: &Arena,
        terrain: &L,
        settings: &SafeTeleportSettings,
    ) -> Option<LandingSpot> {
        let center = arena.center().filter(|_| arena.is_defined())?;
        let half = arena.size() / 2.0;
        // Far from the origin the bounds can round to the same float
        let attempts = if center.x - half < center.x + half && center.z - half < center.z + half {
            settings.max_attempts
        } else {
            0
        };

        for attempt in 0..attempts {
            let x = self.rng.gen_range(center.x - half..center.x + half);
            let z = self.rng.gen_range(center.z - half..center.z + half);

            let Some(surface) = terrain.surface_at(&center.world, x.floor() as i32, z.floor() as i32) else {
                continue;
            };
            if is_safe(&surface, settings) {
                debug!(attempt, x, z, "Safe landing spot found");
                return Some(LandingSpot {
                    position: Position::new(center.world.clone(), x, surface.y, z),
                    fallback: false,
                });
            }
        }

        let y = terrain
            .surface_at(&center.world, center.x.floor() as i32, center.z.floor() as i32)
            .map(|s| s.y)
            .unwrap_or(center.y);
        Some(LandingSpot {
            position: Position::new(center.world.clone(), center.x, y, center.z),
            fallback: true,
        })
    }
}

fn is_safe(surface: &Surface, settings: &SafeTeleportSettings) -> bool {
    let touches = |terrain: Terrain| surface.feet == terrain || surface.below == terrain;

    if settings.check_water && touches(Terrain::Water) {
        return false;
    }
    if settings.check_lava && touches(Terrain::Lava) {
        return false;
    }
    if settings.check_air_above && (surface.feet != Terrain::Air || surface.head != Terrain::Air) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::RecordingHost;

    fn arena() -> Arena {
        let mut arena = Arena::default();
        arena
            .set_center(Position::new("world", 0.0, 64.0, 0.0), 4.0)
            .unwrap();
        arena
    }

    fn surface(feet: Terrain, below: Terrain, head: Terrain) -> Surface {
        Surface {
            y: 70.0,
            feet,
            below,
            head,
        }
    }

    /// Fill every column of the 4x4 test arena
    fn fill(host: &mut RecordingHost, s: Surface) {
        for x in -2..2 {
            for z in -2..2 {
                host.surfaces.insert(("world".to_string(), x, z), s);
            }
        }
    }

    #[test]
    fn test_undefined_arena_has_no_spot() {
        let host = RecordingHost::new();
        let mut finder = SafeSpotFinder::new(7);
        assert!(finder
            .find(&Arena::default(), &host, &SafeTeleportSettings::default())
            .is_none());
    }

    #[test]
    fn test_safe_column_is_used() {
        let mut host = RecordingHost::new();
        fill(&mut host, surface(Terrain::Air, Terrain::Solid, Terrain::Air));

        let mut finder = SafeSpotFinder::new(7);
        let spot = finder
            .find(&arena(), &host, &SafeTeleportSettings::default())
            .unwrap();

        assert!(!spot.fallback);
        assert_eq!(spot.position.y, 70.0);
        assert!(arena().is_in_arena(&spot.position));
    }

    #[test]
    fn test_hazards_fall_back_to_center() {
        let mut host = RecordingHost::new();
        fill(&mut host, surface(Terrain::Air, Terrain::Lava, Terrain::Air));
        host.surfaces.insert(
            ("world".to_string(), 0, 0),
            Surface {
                y: 90.0,
                ..surface(Terrain::Air, Terrain::Water, Terrain::Air)
            },
        );

        let mut finder = SafeSpotFinder::new(7);
        let spot = finder
            .find(&arena(), &host, &SafeTeleportSettings::default())
            .unwrap();

        assert!(spot.fallback);
        assert_eq!(spot.position, Position::new("world", 0.0, 90.0, 0.0));
    }

    #[test]
    fn test_unknown_terrain_falls_back_to_center_height() {
        let host = RecordingHost::new();
        let mut finder = SafeSpotFinder::new(7);
        let spot = finder
            .find(&arena(), &host, &SafeTeleportSettings::default())
            .unwrap();
        assert!(spot.fallback);
        assert_eq!(spot.position.y, 64.0);
    }

    #[test]
    fn test_collapsed_bounds_fall_back_to_center() {
        let mut arena = Arena::default();
        arena
            .set_center(Position::new("world", 1e17, 64.0, 0.0), 1.0)
            .unwrap();
        let host = RecordingHost::new();

        let mut finder = SafeSpotFinder::new(7);
        let spot = finder
            .find(&arena, &host, &SafeTeleportSettings::default())
            .unwrap();
        assert!(spot.fallback);
        assert_eq!(spot.position, Position::new("world", 1e17, 64.0, 0.0));
    }

    #[test]
    fn test_checks_can_be_disabled() {
        let settings = SafeTeleportSettings {
            check_water: false,
            ..SafeTeleportSettings::default()
        };
        assert!(is_safe(&surface(Terrain::Air, Terrain::Water, Terrain::Air), &settings));
        assert!(!is_safe(&surface(Terrain::Air, Terrain::Lava, Terrain::Air), &settings));
        assert!(!is_safe(&surface(Terrain::Solid, Terrain::Solid, Terrain::Air), &settings));
    }
}
