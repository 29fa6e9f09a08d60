//! Match state machine

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

use crate::arena::{Arena, SafeSpotFinder};
use crate::config::GameSettings;
use crate::host::{Host, Notice, ParticipantId, StatusBar};
use crate::util::time::TICKS_PER_SECOND;

use super::border::BorderEngine;
use super::error::MatchError;
use super::rollback::RollbackJournal;
use super::scheduler::{Scheduler, TaskId, TaskKind};
use super::spectator::ForcedSpectators;

/// Match lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchState {
    /// Lobby, accepting players
    Waiting,
    /// Countdown running
    Starting,
    /// Match in progress
    Playing,
    /// Transient while resetting
    Ending,
}

impl MatchState {
    /// Counts toward the single running match
    pub fn is_running(self) -> bool {
        matches!(self, MatchState::Starting | MatchState::Playing)
    }
}

impl fmt::Display for MatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchState::Waiting => "WAITING",
            MatchState::Starting => "STARTING",
            MatchState::Playing => "PLAYING",
            MatchState::Ending => "ENDING",
        };
        f.write_str(name)
    }
}

/// Shared resources a match works with during one call
pub struct MatchCtx<'a> {
    pub scheduler: &'a mut Scheduler,
    pub journal: &'a mut RollbackJournal,
    pub arena: &'a Arena,
    pub settings: &'a GameSettings,
    pub spots: &'a mut SafeSpotFinder,
    pub forced: &'a mut ForcedSpectators,
    pub host: &'a mut dyn Host,
}

/// Whether an operation ended the match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    /// A winner was declared or everyone left; the match has been reset
    Concluded,
}

/// Read-only view for listings
#[derive(Debug, Clone, Serialize)]
pub struct MatchSummary {
    pub id: String,
    pub state: MatchState,
    pub players: usize,
    pub spectators: usize,
    pub min_players: usize,
    pub max_players: usize,
    pub border_state: String,
    pub border_size: f64,
    pub created_at: DateTime<Utc>,
}

/// A single match
pub struct GameMatch {
    id: String,
    state: MatchState,
    max_players: usize,
    min_players: usize,
    countdown_time: u64,
    countdown_left: u64,
    players: HashSet<ParticipantId>,
    spectators: HashSet<ParticipantId>,
    border: BorderEngine,
    countdown_task: Option<TaskId>,
    status_task: Option<TaskId>,
    created_at: DateTime<Utc>,
}

impl GameMatch {
    /// Create a match. The countdown length is read from `settings` once here.
    pub fn new(
        id: impl Into<String>,
        max_players: usize,
        min_players: usize,
        settings: &GameSettings,
    ) -> Self {
        let id = id.into();
        Self {
            border: BorderEngine::new(&id),
            id,
            state: MatchState::Waiting,
            max_players,
            min_players,
            countdown_time: settings.countdown_time,
            countdown_left: 0,
            players: HashSet::new(),
            spectators: HashSet::new(),
            countdown_task: None,
            status_task: None,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn min_players(&self) -> usize {
        self.min_players
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_player(&self, who: ParticipantId) -> bool {
        self.players.contains(&who)
    }

    pub fn is_spectator(&self, who: ParticipantId) -> bool {
        self.spectators.contains(&who)
    }

    /// Player or spectator of this match
    pub fn contains(&self, who: ParticipantId) -> bool {
        self.is_player(who) || self.is_spectator(who)
    }

    pub fn border(&self) -> &BorderEngine {
        &self.border
    }

    pub fn summary(&self) -> MatchSummary {
        MatchSummary {
            id: self.id.clone(),
            state: self.state,
            players: self.players.len(),
            spectators: self.spectators.len(),
            min_players: self.min_players,
            max_players: self.max_players,
            border_state: self.border.state().to_string(),
            border_size: self.border.current_size(),
            created_at: self.created_at,
        }
    }

    /// Add a player. `other_running` tells whether a different match is
    /// currently starting or playing.
    pub fn join(
        &mut self,
        who: ParticipantId,
        other_running: bool,
        ctx: &mut MatchCtx<'_>,
    ) -> Result<(), MatchError> {
        if !matches!(self.state, MatchState::Waiting | MatchState::Starting) {
            return Err(MatchError::MatchInProgress);
        }
        if self.contains(who) {
            return Err(MatchError::AlreadyJoined);
        }
        if self.players.len() >= self.max_players {
            return Err(MatchError::MatchFull {
                max_players: self.max_players,
            });
        }

        ctx.forced.release(who, &mut *ctx.host);
        self.players.insert(who);
        ctx.host.restore_vitals(who);
        if let Some(lobby) = ctx.arena.lobby() {
            ctx.host.teleport(who, lobby);
        }

        let notice = Notice::Joined {
            player_name: display_name(&*ctx.host, who),
            current_players: self.players.len(),
            min_players: self.min_players,
        };
        self.broadcast(ctx, &notice);

        info!(
            match_id = %self.id,
            participant = %who,
            player_count = self.players.len(),
            "Player joined match"
        );

        self.auto_start(other_running, ctx);
        self.refresh_lobby_bar(ctx);
        Ok(())
    }

    /// Remove a player or spectator. Unknown participants are ignored.
    pub fn leave(&mut self, who: ParticipantId, ctx: &mut MatchCtx<'_>) -> Outcome {
        if self.players.remove(&who) {
            info!(
                match_id = %self.id,
                participant = %who,
                player_count = self.players.len(),
                "Player left match"
            );

            let outcome = match self.state {
                MatchState::Starting if self.players.len() < self.min_players => {
                    ctx.scheduler.cancel_slot(&mut self.countdown_task);
                    self.state = MatchState::Waiting;
                    self.broadcast(ctx, &Notice::NotEnoughPlayers);
                    Outcome::Continue
                }
                MatchState::Playing => self.check_win_condition(ctx),
                _ => Outcome::Continue,
            };
            self.refresh_lobby_bar(ctx);
            return outcome;
        }

        if self.spectators.remove(&who) {
            debug!(match_id = %self.id, participant = %who, "Spectator left match");
        }
        Outcome::Continue
    }

    /// Admin start; an empty lobby cannot be started
    pub fn manual_start(
        &mut self,
        other_running: bool,
        ctx: &mut MatchCtx<'_>,
    ) -> Result<(), MatchError> {
        if self.state == MatchState::Waiting && self.players.is_empty() {
            return Err(MatchError::NotEnoughPlayers);
        }
        self.start_countdown(other_running, ctx)
    }

    /// Begin the countdown. Does nothing if already starting or playing.
    pub fn start_countdown(
        &mut self,
        other_running: bool,
        ctx: &mut MatchCtx<'_>,
    ) -> Result<(), MatchError> {
        if self.state.is_running() {
            return Ok(());
        }
        if other_running {
            self.broadcast(ctx, &Notice::AnotherMatchRunning);
            return Err(MatchError::AnotherMatchRunning);
        }

        self.state = MatchState::Starting;
        self.countdown_left = self.countdown_time;
        ctx.scheduler.cancel_slot(&mut self.countdown_task);
        self.countdown_task = Some(ctx.scheduler.schedule(
            &self.id,
            TaskKind::Countdown,
            0,
            TICKS_PER_SECOND,
        ));

        info!(match_id = %self.id, seconds = self.countdown_time, "Countdown started");
        Ok(())
    }

    /// Handle one of this match's scheduler tasks firing
    pub fn on_task(&mut self, kind: TaskKind, ctx: &mut MatchCtx<'_>) {
        match kind {
            TaskKind::Countdown => self.on_countdown_tick(ctx),
            TaskKind::BorderPhase => self.border.on_phase_tick(ctx.scheduler),
            TaskKind::BorderEnforce => {
                let players = self.player_list();
                let now = ctx.scheduler.now();
                self.border.enforce(now, &players, &mut *ctx.host);
            }
            TaskKind::StatusBar => self.on_status_tick(ctx),
        }
    }

    /// Move a player to the spectators after death
    pub fn eliminate(&mut self, who: ParticipantId, ctx: &mut MatchCtx<'_>) -> Outcome {
        if self.state != MatchState::Playing || !self.players.remove(&who) {
            return Outcome::Continue;
        }

        self.spectators.insert(who);
        ctx.host.set_mode(who, ctx.settings.spectator_mode());

        let notice = Notice::Eliminated {
            player_name: display_name(&*ctx.host, who),
        };
        self.broadcast(ctx, &notice);
        info!(
            match_id = %self.id,
            participant = %who,
            remaining = self.players.len(),
            "Player eliminated"
        );

        self.check_win_condition(ctx)
    }

    pub fn check_win_condition(&mut self, ctx: &mut MatchCtx<'_>) -> Outcome {
        if self.state != MatchState::Playing {
            return Outcome::Continue;
        }

        let remaining = self.player_list();
        match remaining.as_slice() {
            [winner] => {
                let player_name = display_name(&*ctx.host, *winner);
                info!(match_id = %self.id, winner = %player_name, "Match won");
                ctx.host.notify_all(&Notice::GameWon { player_name });
                self.reset(false, ctx);
                Outcome::Concluded
            }
            [] => {
                info!(match_id = %self.id, "Match ended without players");
                self.broadcast(ctx, &Notice::GameReset);
                self.reset(false, ctx);
                Outcome::Concluded
            }
            _ => Outcome::Continue,
        }
    }

    /// Stop everything, send everyone to the lobby and roll the arena back
    pub fn reset(&mut self, force: bool, ctx: &mut MatchCtx<'_>) {
        self.state = MatchState::Ending;
        ctx.scheduler.cancel_slot(&mut self.countdown_task);
        ctx.scheduler.cancel_slot(&mut self.status_task);
        self.border.stop(ctx.scheduler);

        if let Some(lobby) = ctx.arena.lobby() {
            for who in self.roster() {
                ctx.host.teleport(who, lobby);
            }
        }

        self.players.clear();
        self.spectators.clear();
        self.countdown_left = 0;
        self.state = MatchState::Waiting;

        let report = ctx.journal.restore_all(&mut *ctx.host);
        info!(
            match_id = %self.id,
            force,
            restored = report.restored,
            failed = report.failed,
            "Match reset"
        );
    }

    fn auto_start(&mut self, other_running: bool, ctx: &mut MatchCtx<'_>) {
        if self.state != MatchState::Waiting || self.players.len() < self.min_players {
            return;
        }
        if let Err(e) = self.start_countdown(other_running, ctx) {
            debug!(match_id = %self.id, reason = %e, "Auto start deferred");
        }
    }

    fn on_countdown_tick(&mut self, ctx: &mut MatchCtx<'_>) {
        if self.state != MatchState::Starting {
            ctx.scheduler.cancel_slot(&mut self.countdown_task);
            return;
        }

        if self.countdown_left == 0 {
            ctx.scheduler.cancel_slot(&mut self.countdown_task);
            self.start_game(ctx);
            return;
        }

        let t = self.countdown_left;
        if t <= 5 || t % 10 == 0 {
            self.broadcast(ctx, &Notice::GameStarting { time_remaining: t });
        }
        let players = self.player_list();
        ctx.host
            .status_bar(&players, &StatusBar::Countdown { time_remaining: t });
        self.countdown_left -= 1;
    }

    fn start_game(&mut self, ctx: &mut MatchCtx<'_>) {
        self.state = MatchState::Playing;
        self.broadcast(ctx, &Notice::GameStarted);

        let mode = ctx.settings.game_mode();
        let arena = ctx.arena;
        for who in self.player_list() {
            if ctx.host.is_forced_spectator(who) {
                warn!(match_id = %self.id, participant = %who, "Forced spectator in roster, skipping");
                continue;
            }
            ctx.host.set_mode(who, mode);
            ctx.host.transition_effect(who);

            match ctx.spots.find(arena, &*ctx.host, &ctx.settings.safe_teleport) {
                Some(spot) => {
                    ctx.host.teleport(who, &spot.position);
                    if spot.fallback {
                        ctx.host.notify(&[who], &Notice::SafeSpotFallback);
                    }
                }
                None => ctx.host.notify(&[who], &Notice::ArenaNotSet),
            }
        }

        if let Some(center) = arena.center() {
            self.border
                .start(ctx.scheduler, center.clone(), arena.size(), &ctx.settings.border);
        }

        ctx.scheduler.cancel_slot(&mut self.status_task);
        self.status_task = Some(ctx.scheduler.schedule(
            &self.id,
            TaskKind::StatusBar,
            0,
            TICKS_PER_SECOND,
        ));

        info!(match_id = %self.id, players = self.players.len(), "Match started");
    }

    fn on_status_tick(&mut self, ctx: &mut MatchCtx<'_>) {
        if self.state != MatchState::Playing {
            ctx.scheduler.cancel_slot(&mut self.status_task);
            return;
        }
        let bar = StatusBar::InGame {
            current_players: self.players.len(),
            border_state: self.border.state().to_string(),
            time_remaining: self.border.time_remaining(),
        };
        ctx.host.status_bar(&self.roster(), &bar);
    }

    fn refresh_lobby_bar(&self, ctx: &mut MatchCtx<'_>) {
        if self.state != MatchState::Waiting || self.players.is_empty() {
            return;
        }
        let bar = StatusBar::Lobby {
            current_players: self.players.len(),
            min_players: self.min_players,
        };
        ctx.host.status_bar(&self.player_list(), &bar);
    }

    fn broadcast(&self, ctx: &mut MatchCtx<'_>, notice: &Notice) {
        let recipients = self.roster();
        if !recipients.is_empty() {
            ctx.host.notify(&recipients, notice);
        }
    }

    fn player_list(&self) -> Vec<ParticipantId> {
        self.players.iter().copied().collect()
    }

    /// Players then spectators
    fn roster(&self) -> Vec<ParticipantId> {
        self.players
            .iter()
            .chain(self.spectators.iter())
            .copied()
            .collect()
    }
}

fn display_name(host: &dyn Host, who: ParticipantId) -> String {
    host.display_name(who)
        .unwrap_or_else(|| "Unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::RecordingHost;
    use crate::host::{Mode, ModeService, Position};

    struct Fixture {
        scheduler: Scheduler,
        journal: RollbackJournal,
        arena: Arena,
        settings: GameSettings,
        spots: SafeSpotFinder,
        forced: ForcedSpectators,
        host: RecordingHost,
    }

    impl Fixture {
        fn new() -> Self {
            let mut arena = Arena::default();
            arena
                .set_center(Position::new("world", 0.0, 64.0, 0.0), 100.0)
                .unwrap();
            arena.set_lobby(lobby());
            Self {
                scheduler: Scheduler::new(),
                journal: RollbackJournal::new(),
                arena,
                settings: GameSettings::default(),
                spots: SafeSpotFinder::new(1),
                forced: ForcedSpectators::new(),
                host: RecordingHost::new(),
            }
        }

        fn ctx(&mut self) -> MatchCtx<'_> {
            MatchCtx {
                scheduler: &mut self.scheduler,
                journal: &mut self.journal,
                arena: &self.arena,
                settings: &self.settings,
                spots: &mut self.spots,
                forced: &mut self.forced,
                host: &mut self.host,
            }
        }

        fn participant(&mut self, name: &str) -> ParticipantId {
            self.host
                .add_participant(name, Position::new("world", 1000.0, 64.0, 1000.0))
        }

        fn join_all(&mut self, m: &mut GameMatch, names: &[&str]) -> Vec<ParticipantId> {
            names
                .iter()
                .map(|name| {
                    let id = self.participant(name);
                    m.join(id, false, &mut self.ctx()).unwrap();
                    id
                })
                .collect()
        }

        fn run(&mut self, m: &mut GameMatch, ticks: u64) {
            for _ in 0..ticks {
                for task in self.scheduler.advance() {
                    if self.scheduler.is_active(task.id) {
                        m.on_task(task.kind, &mut self.ctx());
                    }
                }
            }
        }

        fn playing(&mut self, names: &[&str]) -> (GameMatch, Vec<ParticipantId>) {
            self.settings.countdown_time = 0;
            let mut m = GameMatch::new("game1", 10, names.len(), &self.settings);
            let ids = self.join_all(&mut m, names);
            self.run(&mut m, 1);
            assert_eq!(m.state(), MatchState::Playing);
            (m, ids)
        }
    }

    fn lobby() -> Position {
        Position::new("world", 500.0, 64.0, 500.0)
    }

    #[test]
    fn test_join_rejections_leave_state_untouched() {
        let mut fx = Fixture::new();
        let mut m = GameMatch::new("game1", 2, 3, &fx.settings);
        let ids = fx.join_all(&mut m, &["alice", "bob"]);

        assert_eq!(
            m.join(ids[0], false, &mut fx.ctx()),
            Err(MatchError::AlreadyJoined)
        );
        let carol = fx.participant("carol");
        assert_eq!(
            m.join(carol, false, &mut fx.ctx()),
            Err(MatchError::MatchFull { max_players: 2 })
        );
        assert_eq!(m.player_count(), 2);
        assert_eq!(m.state(), MatchState::Waiting);
        assert!(!fx.host.restored.contains(&carol));
    }

    #[test]
    fn test_join_notifies_and_moves_to_lobby() {
        let mut fx = Fixture::new();
        let mut m = GameMatch::new("game1", 10, 5, &fx.settings);
        let alice = fx.participant("alice");
        fx.host.forced_spectators.insert(alice);

        m.join(alice, false, &mut fx.ctx()).unwrap();

        assert!(!fx.host.is_forced_spectator(alice));
        assert_eq!(fx.host.restored, vec![alice]);
        assert_eq!(fx.host.locations[&alice], lobby());
        assert_eq!(
            fx.host.notices_to(alice),
            vec![&Notice::Joined {
                player_name: "alice".to_string(),
                current_players: 1,
                min_players: 5,
            }]
        );
        assert_eq!(
            fx.host.status_bars.last().unwrap().1,
            StatusBar::Lobby {
                current_players: 1,
                min_players: 5,
            }
        );
    }

    #[test]
    fn test_min_players_starts_countdown() {
        let mut fx = Fixture::new();
        let mut m = GameMatch::new("game1", 10, 2, &fx.settings);
        fx.join_all(&mut m, &["alice"]);
        assert_eq!(m.state(), MatchState::Waiting);

        fx.join_all(&mut m, &["bob"]);
        assert_eq!(m.state(), MatchState::Starting);

        // 10, then 5..1
        fx.run(&mut m, 200);
        let progress = fx
            .host
            .count_notices(|n| matches!(n, Notice::GameStarting { .. }));
        assert_eq!(progress, 6);
        assert_eq!(m.state(), MatchState::Starting);

        fx.run(&mut m, 1);
        assert_eq!(m.state(), MatchState::Playing);
        assert!(m.border().is_running());
    }

    #[test]
    fn test_other_running_match_blocks_start() {
        let mut fx = Fixture::new();
        let mut m = GameMatch::new("game2", 10, 1, &fx.settings);
        let alice = fx.participant("alice");
        m.join(alice, true, &mut fx.ctx()).unwrap();

        assert_eq!(m.state(), MatchState::Waiting);
        assert_eq!(
            fx.host.count_notices(|n| *n == Notice::AnotherMatchRunning),
            1
        );
        assert_eq!(
            m.start_countdown(true, &mut fx.ctx()),
            Err(MatchError::AnotherMatchRunning)
        );
        assert!(fx.scheduler.is_empty());
    }

    #[test]
    fn test_manual_start_of_empty_match() {
        let mut fx = Fixture::new();
        let mut m = GameMatch::new("game1", 10, 2, &fx.settings);
        assert_eq!(
            m.manual_start(false, &mut fx.ctx()),
            Err(MatchError::NotEnoughPlayers)
        );

        fx.join_all(&mut m, &["alice"]);
        assert_eq!(m.manual_start(false, &mut fx.ctx()), Ok(()));
        assert_eq!(m.state(), MatchState::Starting);
    }

    #[test]
    fn test_leave_below_minimum_cancels_countdown() {
        let mut fx = Fixture::new();
        let mut m = GameMatch::new("game1", 10, 2, &fx.settings);
        let ids = fx.join_all(&mut m, &["alice", "bob"]);
        assert_eq!(m.state(), MatchState::Starting);

        assert_eq!(m.leave(ids[1], &mut fx.ctx()), Outcome::Continue);
        assert_eq!(m.state(), MatchState::Waiting);
        assert_eq!(fx.scheduler.pending_for("game1"), 0);
        assert!(fx
            .host
            .notices_to(ids[0])
            .contains(&&Notice::NotEnoughPlayers));

        // Unknown participants are ignored
        assert_eq!(m.leave(ids[1], &mut fx.ctx()), Outcome::Continue);
    }

    #[test]
    fn test_leave_above_minimum_keeps_countdown() {
        let mut fx = Fixture::new();
        let mut m = GameMatch::new("game1", 10, 2, &fx.settings);
        let ids = fx.join_all(&mut m, &["alice", "bob", "carol"]);
        assert_eq!(m.state(), MatchState::Starting);
        let pending = fx.scheduler.pending_for("game1");
        assert!(pending > 0);

        assert_eq!(m.leave(ids[2], &mut fx.ctx()), Outcome::Continue);
        assert_eq!(m.state(), MatchState::Starting);
        assert_eq!(fx.scheduler.pending_for("game1"), pending);
        assert_eq!(fx.host.count_notices(|n| *n == Notice::NotEnoughPlayers), 0);

        fx.run(&mut m, 201);
        assert_eq!(m.state(), MatchState::Playing);
        assert_eq!(m.player_count(), 2);
    }

    #[test]
    fn test_start_game_places_players() {
        let mut fx = Fixture::new();
        let (m, ids) = fx.playing(&["alice", "bob"]);

        for id in &ids {
            assert_eq!(fx.host.modes[id], Mode::Survival);
            assert!(fx.host.effects.contains(id));
            assert!(fx.arena.is_in_arena(&fx.host.locations[id]));
            // No surface data, so the center is used
            assert!(fx.host.notices_to(*id).contains(&&Notice::SafeSpotFallback));
        }
        assert_eq!(m.border().current_size(), 100.0);
        assert_eq!(fx.scheduler.pending_for("game1"), 3);
    }

    #[test]
    fn test_forced_spectator_is_not_placed() {
        let mut fx = Fixture::new();
        fx.settings.countdown_time = 0;
        let mut m = GameMatch::new("game1", 10, 2, &fx.settings);
        let ids = fx.join_all(&mut m, &["alice", "bob"]);
        fx.host.forced_spectators.insert(ids[1]);

        fx.run(&mut m, 1);
        assert_eq!(m.state(), MatchState::Playing);
        assert!(!fx.host.effects.contains(&ids[1]));
        assert_eq!(fx.host.locations[&ids[1]], lobby());
    }

    #[test]
    fn test_missing_arena_notice() {
        let mut fx = Fixture::new();
        fx.arena = Arena::default();
        let (m, ids) = fx.playing(&["alice", "bob"]);

        assert!(fx.host.notices_to(ids[0]).contains(&&Notice::ArenaNotSet));
        assert!(!m.border().is_running());
    }

    #[test]
    fn test_elimination_declares_single_winner() {
        let mut fx = Fixture::new();
        let (mut m, ids) = fx.playing(&["alice", "bob", "carol"]);

        assert_eq!(m.eliminate(ids[0], &mut fx.ctx()), Outcome::Continue);
        assert!(m.is_spectator(ids[0]));
        assert_eq!(fx.host.modes[&ids[0]], Mode::Spectator);

        assert_eq!(m.eliminate(ids[1], &mut fx.ctx()), Outcome::Concluded);
        assert_eq!(
            fx.host.global_notices,
            vec![Notice::GameWon {
                player_name: "carol".to_string(),
            }]
        );
        assert_eq!(m.state(), MatchState::Waiting);
        assert_eq!(m.player_count(), 0);
        assert!(!m.contains(ids[0]));
        for id in &ids {
            assert_eq!(fx.host.locations[id], lobby());
        }
        assert!(fx.scheduler.is_empty());
    }

    #[test]
    fn test_eliminate_outside_play_is_ignored() {
        let mut fx = Fixture::new();
        let mut m = GameMatch::new("game1", 10, 5, &fx.settings);
        let ids = fx.join_all(&mut m, &["alice"]);

        assert_eq!(m.eliminate(ids[0], &mut fx.ctx()), Outcome::Continue);
        assert!(m.is_player(ids[0]));
    }

    #[test]
    fn test_last_player_leaving_concludes() {
        let mut fx = Fixture::new();
        let (mut m, ids) = fx.playing(&["alice", "bob"]);

        assert_eq!(m.leave(ids[0], &mut fx.ctx()), Outcome::Concluded);
        assert_eq!(fx.host.global_notices.len(), 1);
        assert_eq!(m.state(), MatchState::Waiting);
    }

    #[test]
    fn test_reset_restores_journal() {
        let mut fx = Fixture::new();
        let (mut m, _) = fx.playing(&["alice", "bob"]);

        let pos = crate::host::BlockPos {
            world: "world".to_string(),
            x: 3,
            y: 64,
            z: 3,
        };
        fx.journal.record_first_touch(
            pos.clone(),
            crate::host::BlockSnapshot {
                material: "GRASS_BLOCK".to_string(),
                data: None,
                tile: None,
            },
        );

        m.reset(true, &mut fx.ctx());
        assert_eq!(fx.host.written[&pos].material, "GRASS_BLOCK");
        assert!(fx.journal.is_empty());
        assert_eq!(m.state(), MatchState::Waiting);
        assert!(!m.border().is_running());
    }

    #[test]
    fn test_status_bar_reports_border() {
        let mut fx = Fixture::new();
        let (mut m, ids) = fx.playing(&["alice", "bob"]);
        fx.host.status_bars.clear();

        fx.run(&mut m, 20);
        let (recipients, bar) = fx.host.status_bars.last().unwrap();
        assert_eq!(recipients.len(), ids.len());
        assert!(matches!(
            bar,
            StatusBar::InGame {
                current_players: 2,
                ..
            }
        ));
    }
}
