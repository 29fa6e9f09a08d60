//! The shared arena: square play region, lobby and their persistence

pub mod safe_spot;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::game::MatchError;
use crate::host::Position;

pub use safe_spot::SafeSpotFinder;

/// Smallest side length accepted for the arena, in blocks
pub const MIN_ARENA_SIZE: f64 = 1.0;

fn is_valid_size(size: f64) -> bool {
    size.is_finite() && size >= MIN_ARENA_SIZE
}

/// Progress of a two-corner arena definition
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CornerProgress {
    /// The other corner is still missing
    Pending,
    /// Both corners set; the arena now has this size
    Defined { size: f64 },
}

/// Arena geometry. All matches share the one arena.
#[derive(Debug, Clone, Default)]
pub struct Arena {
    center: Option<Position>,
    size: f64,
    lobby: Option<Position>,
    corner_1: Option<Position>,
    corner_2: Option<Position>,
}

impl Arena {
    pub fn center(&self) -> Option<&Position> {
        self.center.as_ref()
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn lobby(&self) -> Option<&Position> {
        self.lobby.as_ref()
    }

    /// Center and size are both usable
    pub fn is_defined(&self) -> bool {
        self.center.is_some() && self.size > 0.0
    }

    pub fn is_in_arena(&self, pos: &Position) -> bool {
        let Some(center) = &self.center else {
            return false;
        };
        if self.size <= 0.0 || pos.world != center.world {
            return false;
        }

        let half = self.size / 2.0;
        pos.x >= center.x - half
            && pos.x <= center.x + half
            && pos.z >= center.z - half
            && pos.z <= center.z + half
    }

    pub fn set_center(&mut self, center: Position, size: f64) -> Result<(), MatchError> {
        if !is_valid_size(size) {
            return Err(MatchError::InvalidArenaGeometry("size must be at least one block"));
        }
        info!(world = %center.world, x = center.x, z = center.z, size, "Arena defined");
        self.center = Some(center);
        self.size = size;
        Ok(())
    }

    /// Set corner 1 or 2. Once both are known the arena becomes the square
    /// centered between them whose side is the larger of the two extents.
    pub fn set_corner(&mut self, corner: u8, pos: Position) -> Result<CornerProgress, MatchError> {
        match corner {
            1 => self.corner_1 = Some(pos),
            2 => self.corner_2 = Some(pos),
            _ => return Err(MatchError::InvalidArenaGeometry("corner must be 1 or 2")),
        }

        let (Some(a), Some(b)) = (&self.corner_1, &self.corner_2) else {
            return Ok(CornerProgress::Pending);
        };
        if a.world != b.world {
            return Err(MatchError::InvalidArenaGeometry("corners are in different worlds"));
        }

        let (min_x, max_x) = (a.x.min(b.x), a.x.max(b.x));
        let (min_z, max_z) = (a.z.min(b.z), a.z.max(b.z));
        let center = Position::new(
            a.world.clone(),
            min_x + (max_x - min_x) / 2.0,
            a.y,
            min_z + (max_z - min_z) / 2.0,
        );
        let size = (max_x - min_x).max(max_z - min_z);

        self.set_center(center, size)?;
        Ok(CornerProgress::Defined { size })
    }

    pub fn set_lobby(&mut self, lobby: Position) {
        info!(world = %lobby.world, x = lobby.x, y = lobby.y, z = lobby.z, "Lobby set");
        self.lobby = Some(lobby);
    }

    pub fn to_document(&self) -> ArenaDocument {
        ArenaDocument {
            center: self.center.clone(),
            size: self.size,
            lobby: self.lobby.clone(),
        }
    }

    pub fn from_document(doc: ArenaDocument) -> Self {
        // A center without a usable size is treated as unset
        let center = doc.center.filter(|_| is_valid_size(doc.size));
        Self {
            size: if center.is_some() { doc.size } else { 0.0 },
            center,
            lobby: doc.lobby,
            corner_1: None,
            corner_2: None,
        }
    }
}

/// On-disk form of the arena
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArenaDocument {
    #[serde(default)]
    pub center: Option<Position>,
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub lobby: Option<Position>,
}

#[derive(Debug, thiserror::Error)]
pub enum ArenaStoreError {
    #[error("Arena file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arena file is malformed: {0}")]
    Format(#[from] serde_json::Error),
}

/// JSON file holding the arena between restarts
#[derive(Debug, Clone)]
pub struct ArenaStore {
    path: PathBuf,
}

impl ArenaStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the arena; a missing file is an empty arena
    pub fn load(&self) -> Result<Arena, ArenaStoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => {
                let doc: ArenaDocument = serde_json::from_str(&text)?;
                Ok(Arena::from_document(doc))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Arena::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the arena, replacing the file atomically
    pub fn save(&self, arena: &Arena) -> Result<(), ArenaStoreError> {
        let json = serde_json::to_string_pretty(&arena.to_document())?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
