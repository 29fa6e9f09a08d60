//! Game settings document (`settings.json`)
//!
//! Read once at startup and again on admin reload. Every field has a default;
//! a missing or unreadable file yields the defaults, and malformed border
//! phases are skipped individually so one typo never blocks a match.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::game::border::BorderPhase;
use crate::host::Mode;

/// Particle names the bridge knows how to render
const KNOWN_PARTICLES: &[&str] = &[
    "FLAME",
    "SOUL_FIRE_FLAME",
    "DUST",
    "END_ROD",
    "SMOKE",
    "CLOUD",
    "HAPPY_VILLAGER",
    "ELECTRIC_SPARK",
    "DRIPPING_LAVA",
];

const DEFAULT_PARTICLE: &str = "FLAME";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GameSettings {
    /// Floor for derived minimum player counts
    pub min_players: usize,
    /// Capacity for matches created without an explicit maximum
    pub max_players: usize,
    /// Countdown length in seconds
    pub countdown_time: u64,
    /// Mode players are put into when a match starts
    pub game_mode: String,
    /// Mode eliminated players are put into
    pub spectator_mode: String,
    /// Whether non-participants inside the arena are flagged as spectators
    pub allow_spectators: bool,
    /// Command prefixes participants may not use during a match
    pub blocked_commands: Vec<String>,
    pub border: BorderSettings,
    pub safe_teleport: SafeTeleportSettings,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 100,
            countdown_time: 10,
            game_mode: "SURVIVAL".to_string(),
            spectator_mode: "SPECTATOR".to_string(),
            allow_spectators: true,
            blocked_commands: vec![
                "/spawn".to_string(),
                "/home".to_string(),
                "/tpa".to_string(),
                "/warp".to_string(),
            ],
            border: BorderSettings::default(),
            safe_teleport: SafeTeleportSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BorderSettings {
    /// Border size used when the arena has none
    pub arena_size: f64,
    /// Seconds between "outside border" notices to one participant
    pub message_cooldown: u64,
    /// Ticks between enforcement passes
    pub enforce_interval: u64,
    /// Raw phase entries, validated by [`BorderSettings::phases`]
    pub phases: Vec<serde_json::Value>,
    pub particle: String,
    pub particle_count: u32,
    pub view_distance: f64,
    pub min_y: i32,
    pub max_y: i32,
    pub horizontal_particle_density: f64,
    pub vertical_particle_density: f64,
}

impl Default for BorderSettings {
    fn default() -> Self {
        Self {
            arena_size: 500.0,
            message_cooldown: 5,
            enforce_interval: 5,
            phases: vec![
                serde_json::json!({ "time": 60, "shrink-time": 20, "radius": 5, "size": 400, "damage": 1 }),
                serde_json::json!({ "time": 45, "shrink-time": 20, "radius": 5, "size": 250, "damage": 2 }),
                serde_json::json!({ "time": 30, "shrink-time": 10, "radius": 5, "size": 100, "damage": 3 }),
                serde_json::json!({ "time": 20, "shrink-time": 10, "radius": 2, "size": 20, "damage": 5 }),
            ],
            particle: DEFAULT_PARTICLE.to_string(),
            particle_count: 1,
            view_distance: 32.0,
            min_y: -64,
            max_y: 320,
            horizontal_particle_density: 0.5,
            vertical_particle_density: 2.0,
        }
    }
}

/// One phase entry as written in the settings file
#[derive(Debug, Deserialize)]
struct RawPhase {
    time: f64,
    #[serde(rename = "shrink-time")]
    shrink_time: f64,
    radius: f64,
    size: f64,
    damage: f64,
}

impl BorderSettings {
    /// Validated phase schedule. Malformed entries are skipped.
    pub fn phases(&self) -> Vec<BorderPhase> {
        self.phases
            .iter()
            .enumerate()
            .filter_map(|(index, value)| match parse_phase(value) {
                Ok(phase) => Some(phase),
                Err(reason) => {
                    warn!(phase = index, reason = %reason, "Skipping malformed border phase");
                    None
                }
            })
            .collect()
    }

    /// Configured particle, or the default if the name is unknown
    pub fn particle(&self) -> String {
        let name = self.particle.trim().to_ascii_uppercase();
        if KNOWN_PARTICLES.contains(&name.as_str()) {
            name
        } else {
            warn!(particle = %self.particle, "Unknown border particle, using {}", DEFAULT_PARTICLE);
            DEFAULT_PARTICLE.to_string()
        }
    }
}

fn parse_phase(value: &serde_json::Value) -> Result<BorderPhase, String> {
    let raw: RawPhase = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;

    let finite = [raw.time, raw.shrink_time, raw.radius, raw.size, raw.damage]
        .iter()
        .all(|v| v.is_finite());
    if !finite {
        return Err("non-finite value".to_string());
    }
    if raw.time < 0.0 || raw.shrink_time < 0.0 {
        return Err("negative duration".to_string());
    }
    if raw.radius <= 0.0 {
        return Err("shrink amount must be positive".to_string());
    }
    if raw.size < 0.0 || raw.damage < 0.0 {
        return Err("negative size or damage".to_string());
    }

    Ok(BorderPhase {
        wait_seconds: raw.time as u64,
        shrink_interval_ticks: (raw.shrink_time as u64).max(1),
        shrink_amount: raw.radius,
        target_size: raw.size,
        damage: raw.damage,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SafeTeleportSettings {
    pub max_attempts: u32,
    pub check_water: bool,
    pub check_lava: bool,
    pub check_air_above: bool,
}

impl Default for SafeTeleportSettings {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            check_water: true,
            check_lava: true,
            check_air_above: true,
        }
    }
}

impl GameSettings {
    /// Load settings from `path`, falling back to defaults
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Malformed settings file, using defaults");
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No settings file, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable settings file, using defaults");
                Self::default()
            }
        }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Mode players are switched to at match start
    pub fn game_mode(&self) -> Mode {
        Mode::parse_or(&self.game_mode, Mode::Survival)
    }

    pub fn spectator_mode(&self) -> Mode {
        Mode::parse_or(&self.spectator_mode, Mode::Spectator)
    }

    /// Minimum players for a match of the given capacity
    pub fn derive_min_players(&self, max_players: usize, explicit: Option<usize>) -> usize {
        match explicit {
            Some(min) => min,
            None if max_players <= 4 => max_players,
            None => self.min_players.max(max_players / 2),
        }
    }

    /// Whether `line` starts with a blocked command prefix
    pub fn is_command_blocked(&self, line: &str) -> bool {
        let line = line.trim().to_lowercase();
        self.blocked_commands
            .iter()
            .any(|cmd| !cmd.is_empty() && line.starts_with(&cmd.to_lowercase()))
    }
}
