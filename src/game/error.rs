//! User-facing denials

use crate::host::Notice;

/// Reasons a match request is refused. None of these are fatal; callers
/// surface them to whoever asked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("Match is full ({max_players} players)")]
    MatchFull { max_players: usize },

    #[error("Match is already in progress")]
    MatchInProgress,

    #[error("Already in a match")]
    AlreadyJoined,

    #[error("Not in a match")]
    NotInMatch,

    #[error("Not enough players to start")]
    NotEnoughPlayers,

    #[error("Another match is already running")]
    AnotherMatchRunning,

    #[error("Match not found: {0}")]
    MatchNotFound(String),

    #[error("Invalid arena geometry: {0}")]
    InvalidArenaGeometry(&'static str),

    #[error("No matches available")]
    NoMatchesAvailable,

    #[error("Several matches are open, specify one")]
    SpecifyMatch,
}

impl MatchError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            MatchError::MatchFull { .. } => "match_full",
            MatchError::MatchInProgress => "match_in_progress",
            MatchError::AlreadyJoined => "already_joined",
            MatchError::NotInMatch => "not_in_match",
            MatchError::NotEnoughPlayers => "not_enough_players",
            MatchError::AnotherMatchRunning => "another_match_running",
            MatchError::MatchNotFound(_) => "match_not_found",
            MatchError::InvalidArenaGeometry(_) => "invalid_arena_geometry",
            MatchError::NoMatchesAvailable => "no_matches_available",
            MatchError::SpecifyMatch => "specify_match",
        }
    }

    pub fn to_notice(&self) -> Notice {
        Notice::Denied {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}
