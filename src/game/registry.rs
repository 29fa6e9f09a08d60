//! Registry of matches and routing of host events

use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::arena::{Arena, CornerProgress, SafeSpotFinder};
use crate::config::GameSettings;
use crate::host::{BlockPos, BlockSnapshot, Host, Notice, ParticipantId, Position};

use super::error::MatchError;
use super::r#match::{GameMatch, MatchCtx, MatchState, MatchSummary, Outcome};
use super::rollback::RollbackJournal;
use super::scheduler::Scheduler;
use super::spectator::ForcedSpectators;

/// Resources shared by every match
struct ArenaEnv {
    scheduler: Scheduler,
    journal: RollbackJournal,
    arena: Arena,
    settings: GameSettings,
    spots: SafeSpotFinder,
    forced: ForcedSpectators,
    next_id: u64,
}

impl ArenaEnv {
    fn ctx<'a>(&'a mut self, host: &'a mut dyn Host) -> MatchCtx<'a> {
        MatchCtx {
            scheduler: &mut self.scheduler,
            journal: &mut self.journal,
            arena: &self.arena,
            settings: &self.settings,
            spots: &mut self.spots,
            forced: &mut self.forced,
            host,
        }
    }
}

/// All matches plus the arena, journal and clock they share
pub struct MatchRegistry {
    matches: BTreeMap<String, GameMatch>,
    env: ArenaEnv,
}

impl MatchRegistry {
    pub fn new(settings: GameSettings, arena: Arena, spots: SafeSpotFinder) -> Self {
        Self {
            matches: BTreeMap::new(),
            env: ArenaEnv {
                scheduler: Scheduler::new(),
                journal: RollbackJournal::new(),
                arena,
                settings,
                spots,
                forced: ForcedSpectators::new(),
                next_id: 1,
            },
        }
    }

    pub fn settings(&self) -> &GameSettings {
        &self.env.settings
    }

    pub fn arena(&self) -> &Arena {
        &self.env.arena
    }

    pub fn journal(&self) -> &RollbackJournal {
        &self.env.journal
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.env.scheduler
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&GameMatch> {
        self.matches.get(id)
    }

    /// Match the participant plays or spectates in
    pub fn match_of(&self, who: ParticipantId) -> Option<&GameMatch> {
        self.matches.values().find(|m| m.contains(who))
    }

    pub fn list(&self) -> Vec<MatchSummary> {
        self.matches.values().map(GameMatch::summary).collect()
    }

    /// Create a match. Capacity defaults to the configured maximum.
    pub fn create(&mut self, max_players: Option<usize>, min_players: Option<usize>) -> String {
        let settings = &self.env.settings;
        let max_players = max_players.unwrap_or(settings.max_players).max(1);
        let min_players = settings.derive_min_players(max_players, min_players);

        let id = format!("game{}", self.env.next_id);
        self.env.next_id += 1;

        let game = GameMatch::new(id.clone(), max_players, min_players, settings);
        self.matches.insert(id.clone(), game);

        info!(match_id = %id, max_players, min_players, "Match created");
        id
    }

    /// Stop and remove a match
    pub fn delete(&mut self, id: &str, host: &mut dyn Host) -> Result<(), MatchError> {
        let mut game = self
            .matches
            .remove(id)
            .ok_or_else(|| MatchError::MatchNotFound(id.to_string()))?;

        game.reset(false, &mut self.env.ctx(host));
        self.cancel_orphans(id);
        self.after_removal();
        info!(match_id = %id, "Match deleted");
        Ok(())
    }

    /// Join a match by id, or the only existing match when no id is given
    pub fn join(
        &mut self,
        id: Option<&str>,
        who: ParticipantId,
        host: &mut dyn Host,
    ) -> Result<String, MatchError> {
        let id = self.resolve(id)?;
        let in_other = self.match_of(who).is_some();
        let other_running = self.other_running(&id);

        let game = self
            .matches
            .get_mut(&id)
            .ok_or_else(|| MatchError::MatchNotFound(id.clone()))?;
        if !matches!(game.state(), MatchState::Waiting | MatchState::Starting) {
            return Err(MatchError::MatchInProgress);
        }
        if in_other {
            return Err(MatchError::AlreadyJoined);
        }

        game.join(who, other_running, &mut self.env.ctx(host))?;
        Ok(id)
    }

    /// Leave whichever match the participant is in
    pub fn leave(&mut self, who: ParticipantId, host: &mut dyn Host) -> Result<String, MatchError> {
        let id = self.id_of(who).ok_or(MatchError::NotInMatch)?;
        self.leave_match(&id, who, host);
        Ok(id)
    }

    /// Admin start, skipping the minimum player count
    pub fn start(&mut self, id: Option<&str>, host: &mut dyn Host) -> Result<String, MatchError> {
        let id = self.resolve(id)?;
        let other_running = self.other_running(&id);
        let game = self
            .matches
            .get_mut(&id)
            .ok_or_else(|| MatchError::MatchNotFound(id.clone()))?;

        game.manual_start(other_running, &mut self.env.ctx(host))?;
        Ok(id)
    }

    /// Forced reset; the match stays registered
    pub fn reset(&mut self, id: &str, host: &mut dyn Host) -> Result<(), MatchError> {
        let game = self
            .matches
            .get_mut(id)
            .ok_or_else(|| MatchError::MatchNotFound(id.to_string()))?;

        game.reset(true, &mut self.env.ctx(host));
        Ok(())
    }

    /// Stop every match and empty the registry
    pub fn reset_all(&mut self, host: &mut dyn Host) {
        let matches = std::mem::take(&mut self.matches);
        let count = matches.len();
        for (id, mut game) in matches {
            game.reset(false, &mut self.env.ctx(host));
            self.cancel_orphans(&id);
        }
        self.after_removal();

        // The journal is restored by each reset; this covers an empty registry
        self.env.journal.restore_all(host);
        info!(count, "All matches reset");
    }

    /// Drop the journal without writing anything back
    pub fn discard_journal(&mut self) -> usize {
        let discarded = self.env.journal.clear();
        info!(discarded, "Rollback journal discarded");
        discarded
    }

    pub fn set_arena_center(&mut self, center: Position, size: f64) -> Result<(), MatchError> {
        self.env.arena.set_center(center, size)
    }

    pub fn set_arena_corner(
        &mut self,
        corner: u8,
        pos: Position,
    ) -> Result<CornerProgress, MatchError> {
        self.env.arena.set_corner(corner, pos)
    }

    pub fn set_lobby(&mut self, lobby: Position) {
        self.env.arena.set_lobby(lobby);
    }

    /// Replace the settings. Running matches keep their countdown and border
    /// phases; new values apply from the next match creation or border start.
    pub fn reload_settings(&mut self, settings: GameSettings) {
        self.env.settings = settings;
        info!("Settings reloaded");
    }

    /// Advance the clock one tick and run every due task
    pub fn tick(&mut self, host: &mut dyn Host) {
        for task in self.env.scheduler.advance() {
            // Cancelled by an earlier task this tick
            if !self.env.scheduler.is_active(task.id) {
                continue;
            }

            let Some(game) = self.matches.get_mut(&task.owner) else {
                warn!(owner = %task.owner, kind = ?task.kind, "Task without a match, cancelling");
                self.env.scheduler.cancel(task.id);
                continue;
            };
            game.on_task(task.kind, &mut self.env.ctx(host));
        }
    }

    /// A participant moved, teleported or connected at `pos`. With
    /// spectators disabled no region checks run at all, so players may also
    /// leave the arena mid-match.
    pub fn on_participant_moved(&mut self, who: ParticipantId, pos: &Position, host: &mut dyn Host) {
        if !self.env.settings.allow_spectators {
            return;
        }
        let inside = self.env.arena.is_in_arena(pos);

        if let Some(id) = self.id_of(who) {
            let playing = self
                .matches
                .get(&id)
                .is_some_and(|m| m.state() == MatchState::Playing);
            if playing && !inside {
                self.leave_match(&id, who, host);
                host.notify(&[who], &Notice::LeftGameArea);
            }
            return;
        }

        if inside {
            let mode = self.env.settings.spectator_mode();
            if self.env.forced.enter(who, mode, host) {
                host.notify(&[who], &Notice::SpectatorEnter);
            }
        } else if self.env.forced.release(who, host) {
            host.notify(&[who], &Notice::SpectatorLeave);
        }
    }

    pub fn on_participant_quit(&mut self, who: ParticipantId, host: &mut dyn Host) {
        if let Some(id) = self.id_of(who) {
            self.leave_match(&id, who, host);
        }
    }

    pub fn on_participant_died(&mut self, who: ParticipantId, host: &mut dyn Host) {
        let Some(id) = self.id_of(who) else {
            return;
        };
        let Some(game) = self.matches.get_mut(&id) else {
            return;
        };
        if game.state() != MatchState::Playing {
            return;
        }

        let outcome = game.eliminate(who, &mut self.env.ctx(host));
        self.settle(&id, outcome);
    }

    /// Respawn point override: eliminated players go back to the lobby
    pub fn on_participant_respawn(&self, who: ParticipantId) -> Option<Position> {
        self.match_of(who)
            .filter(|m| m.is_spectator(who))
            .and_then(|_| self.env.arena.lobby().cloned())
    }

    /// A block inside the world is about to change. Records the original
    /// when the change belongs to a playing match. `actor` is `None` for
    /// changes without a participant, such as explosions.
    pub fn on_world_mutation(
        &mut self,
        actor: Option<ParticipantId>,
        pos: BlockPos,
        original: BlockSnapshot,
    ) -> bool {
        let at = Position::new(pos.world.clone(), pos.x as f64, pos.y as f64, pos.z as f64);
        if !self.env.arena.is_in_arena(&at) {
            return false;
        }

        let active = match actor {
            Some(who) => self
                .match_of(who)
                .is_some_and(|m| m.state() == MatchState::Playing),
            None => self
                .matches
                .values()
                .any(|m| m.state() == MatchState::Playing),
        };
        if !active {
            return false;
        }

        self.env.journal.record_first_touch(pos, original)
    }

    /// Participants of a match may not use the configured commands
    pub fn is_command_blocked(&self, who: ParticipantId, line: &str) -> bool {
        self.match_of(who).is_some() && self.env.settings.is_command_blocked(line)
    }

    fn resolve(&self, id: Option<&str>) -> Result<String, MatchError> {
        if let Some(id) = id {
            if self.matches.contains_key(id) {
                return Ok(id.to_string());
            }
            return Err(MatchError::MatchNotFound(id.to_string()));
        }

        let mut ids = self.matches.keys();
        match (ids.next(), ids.next()) {
            (Some(only), None) => Ok(only.clone()),
            (None, _) => Err(MatchError::NoMatchesAvailable),
            _ => Err(MatchError::SpecifyMatch),
        }
    }

    fn id_of(&self, who: ParticipantId) -> Option<String> {
        self.match_of(who).map(|m| m.id().to_string())
    }

    fn other_running(&self, id: &str) -> bool {
        self.matches
            .values()
            .any(|m| m.id() != id && m.state().is_running())
    }

    fn leave_match(&mut self, id: &str, who: ParticipantId, host: &mut dyn Host) {
        let Some(game) = self.matches.get_mut(id) else {
            return;
        };
        let outcome = game.leave(who, &mut self.env.ctx(host));
        self.settle(id, outcome);
    }

    /// Remove a match that concluded on its own
    fn settle(&mut self, id: &str, outcome: Outcome) {
        if outcome != Outcome::Concluded {
            return;
        }
        if self.matches.remove(id).is_some() {
            self.cancel_orphans(id);
            self.after_removal();
            info!(match_id = %id, "Concluded match removed");
        }
    }

    fn cancel_orphans(&mut self, id: &str) {
        let cancelled = self.env.scheduler.cancel_owner(id);
        if cancelled > 0 {
            debug!(match_id = %id, cancelled, "Cancelled leftover tasks");
        }
    }

    fn after_removal(&mut self) {
        if self.matches.is_empty() {
            self.env.next_id = 1;
        }
    }
}
