//! Contracts with the hosting world
//!
//! The orchestrator never touches the world directly. Everything it needs
//! (locations, modes, damage, messages, block writes) goes through the
//! traits in this module. In production they are served by the WebSocket
//! bridge; in tests by a recording host.

pub mod bridge;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub use bridge::BridgeHost;

/// Identifier of a connected participant
pub type ParticipantId = Uuid;

/// A position in some world of the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// Block coordinate containing this position
    pub fn block(&self) -> BlockPos {
        BlockPos {
            world: self.world.clone(),
            x: self.x.floor() as i32,
            y: self.y.floor() as i32,
            z: self.z.floor() as i32,
        }
    }
}

/// Integer block coordinate, the key of the rollback journal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub world: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// Captured state of one block before it was changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSnapshot {
    /// Material name, e.g. "STONE"
    pub material: String,
    /// Serialized block state (orientation, waterlogging, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Tile entity payload (chest contents, sign text, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile: Option<serde_json::Value>,
}

/// Participant game mode. Opaque to the orchestrator apart from
/// comparing and setting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    Survival,
    Adventure,
    Creative,
    Spectator,
}

impl Mode {
    /// Parse a configured mode name, falling back on unknown values
    pub fn parse_or(name: &str, fallback: Mode) -> Mode {
        match name.parse() {
            Ok(mode) => mode,
            Err(_) => {
                tracing::warn!(mode = name, fallback = %fallback, "Unknown game mode in settings");
                fallback
            }
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Survival => "SURVIVAL",
            Mode::Adventure => "ADVENTURE",
            Mode::Creative => "CREATIVE",
            Mode::Spectator => "SPECTATOR",
        };
        f.write_str(name)
    }
}

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SURVIVAL" => Ok(Mode::Survival),
            "ADVENTURE" => Ok(Mode::Adventure),
            "CREATIVE" => Ok(Mode::Creative),
            "SPECTATOR" => Ok(Mode::Spectator),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown game mode: {0}")]
pub struct UnknownMode(pub String);

/// Terrain category of a block, as far as landing safety cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    Air,
    Water,
    Lava,
    Solid,
}

/// Top of a world column as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    /// Landing height (one above the highest block)
    pub y: f64,
    /// Block at the landing height
    pub feet: Terrain,
    /// Block beneath the landing height
    pub below: Terrain,
    /// Block above the landing height
    pub head: Terrain,
}

/// Chat notices sent to participants. The host owns the wording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum Notice {
    Denied { code: String, message: String },
    Joined {
        player_name: String,
        current_players: usize,
        min_players: usize,
    },
    NotEnoughPlayers,
    AnotherMatchRunning,
    GameStarting { time_remaining: u64 },
    GameStarted,
    GameWon { player_name: String },
    GameReset,
    Eliminated { player_name: String },
    OutsideBorder,
    LeftGameArea,
    SpectatorEnter,
    SpectatorLeave,
    ArenaNotSet,
    SafeSpotFallback,
    CommandBlocked,
}

/// Action-bar status lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "bar", rename_all = "snake_case")]
pub enum StatusBar {
    Lobby {
        current_players: usize,
        min_players: usize,
    },
    Countdown { time_remaining: u64 },
    InGame {
        current_players: usize,
        border_state: String,
        time_remaining: u64,
    },
}

/// Border geometry handed to the host for wall rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorderView {
    pub world: String,
    pub center_x: f64,
    pub center_z: f64,
    pub size: f64,
    pub state: String,
    pub time_remaining: u64,
    pub particle: String,
    pub particle_count: u32,
    pub view_distance: f64,
    pub min_y: i32,
    pub max_y: i32,
    pub horizontal_density: f64,
    pub vertical_density: f64,
}

/// Failure writing a block back into the world
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("World bridge unavailable")]
    Unavailable,

    #[error("World write queue is full")]
    Backlogged,

    #[error("Block write rejected: {0}")]
    Rejected(String),
}

/// Where participants are and how to move them
pub trait LocationService {
    fn current_location(&self, who: ParticipantId) -> Option<Position>;
    fn teleport(&mut self, who: ParticipantId, to: &Position);
    /// Surface column at block (x, z), if the host has reported it
    fn surface_at(&self, world: &str, x: i32, z: i32) -> Option<Surface>;
}

/// Fire-and-forget presentation
pub trait Presenter {
    fn notify(&mut self, recipients: &[ParticipantId], notice: &Notice);
    fn notify_all(&mut self, notice: &Notice);
    fn status_bar(&mut self, recipients: &[ParticipantId], bar: &StatusBar);
    fn render_border(&mut self, recipients: &[ParticipantId], view: &BorderView);
    fn transition_effect(&mut self, who: ParticipantId);
}

/// Game mode and forced-spectator flags
pub trait ModeService {
    fn mode(&self, who: ParticipantId) -> Option<Mode>;
    fn set_mode(&mut self, who: ParticipantId, mode: Mode);
    fn is_forced_spectator(&self, who: ParticipantId) -> bool;
    fn set_forced_spectator(&mut self, who: ParticipantId, forced: bool);
}

/// Health, hunger and names
pub trait Vitals {
    fn restore_vitals(&mut self, who: ParticipantId);
    fn damage(&mut self, who: ParticipantId, amount: f64);
    fn display_name(&self, who: ParticipantId) -> Option<String>;
}

/// Block writes used by rollback
pub trait WorldWriter {
    fn write_block(&mut self, pos: &BlockPos, snapshot: &BlockSnapshot) -> Result<(), WorldError>;
}

/// Everything the orchestrator asks of the host
pub trait Host: LocationService + Presenter + ModeService + Vitals + WorldWriter {}

impl<T> Host for T where T: LocationService + Presenter + ModeService + Vitals + WorldWriter {}
