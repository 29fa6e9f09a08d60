//! Shrinking square border
//!
//! Each phase first waits (`wait_seconds`, one decrement per second) and then
//! shrinks by `2 * shrink_amount` every `shrink_interval_ticks` until the
//! phase's target size. After the last phase the border holds its size.
//! A separate enforcement task damages players standing outside.

use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

use crate::config::BorderSettings;
use crate::host::{BorderView, Host, Mode, Notice, ParticipantId, Position};
use crate::util::time::{secs_to_ticks, TICKS_PER_SECOND};

use super::scheduler::{Scheduler, TaskId, TaskKind, Tick};

/// Damage applied when no phase is configured at all
const FALLBACK_DAMAGE: f64 = 1.0;

/// One step of the shrink schedule
#[derive(Debug, Clone, PartialEq)]
pub struct BorderPhase {
    /// Seconds to wait before shrinking
    pub wait_seconds: u64,
    /// Ticks between shrink steps
    pub shrink_interval_ticks: u64,
    /// Distance each side moves in per step
    pub shrink_amount: f64,
    /// Size at which the phase ends
    pub target_size: f64,
    /// Damage per enforcement pass while outside
    pub damage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderState {
    Waiting,
    Shrinking,
    Holding,
}

impl fmt::Display for BorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BorderState::Waiting => "WAITING",
            BorderState::Shrinking => "SHRINKING",
            BorderState::Holding => "HOLDING",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
struct Visual {
    particle: String,
    particle_count: u32,
    view_distance: f64,
    min_y: i32,
    max_y: i32,
    horizontal_density: f64,
    vertical_density: f64,
}

impl Visual {
    fn from_settings(settings: &BorderSettings) -> Self {
        Self {
            particle: settings.particle(),
            particle_count: settings.particle_count,
            view_distance: settings.view_distance,
            min_y: settings.min_y,
            max_y: settings.max_y,
            horizontal_density: settings.horizontal_particle_density,
            vertical_density: settings.vertical_particle_density,
        }
    }
}

/// Border owned by a single match
pub struct BorderEngine {
    owner: String,
    center: Option<Position>,
    current_size: f64,
    phases: Vec<BorderPhase>,
    phase_index: usize,
    state: BorderState,
    time_remaining: u64,
    phase_task: Option<TaskId>,
    enforce_task: Option<TaskId>,
    enforce_interval: Tick,
    message_cooldown: Tick,
    last_notice: HashMap<ParticipantId, Tick>,
    visual: Visual,
}

impl BorderEngine {
    pub fn new(owner: &str) -> Self {
        let defaults = BorderSettings::default();
        Self {
            owner: owner.to_string(),
            center: None,
            current_size: 0.0,
            phases: Vec::new(),
            phase_index: 0,
            state: BorderState::Waiting,
            time_remaining: 0,
            phase_task: None,
            enforce_task: None,
            enforce_interval: defaults.enforce_interval,
            message_cooldown: secs_to_ticks(defaults.message_cooldown),
            last_notice: HashMap::new(),
            visual: Visual::from_settings(&defaults),
        }
    }

    /// Start the border at `center`. A non-positive size falls back to the
    /// configured arena size. The phase list is read from `settings` once
    /// here and stays fixed until the next start.
    pub fn start(
        &mut self,
        scheduler: &mut Scheduler,
        center: Position,
        initial_size: f64,
        settings: &BorderSettings,
    ) {
        self.stop(scheduler);

        self.phases = settings.phases();
        self.current_size = if initial_size > 0.0 {
            initial_size
        } else {
            settings.arena_size
        };
        self.center = Some(center);
        self.phase_index = 0;
        self.enforce_interval = settings.enforce_interval.max(1);
        self.message_cooldown = secs_to_ticks(settings.message_cooldown);
        self.last_notice.clear();
        self.visual = Visual::from_settings(settings);

        info!(
            match_id = %self.owner,
            size = self.current_size,
            phases = self.phases.len(),
            "Border started"
        );

        self.begin_phase(scheduler);
        self.enforce_task = Some(scheduler.schedule(
            &self.owner,
            TaskKind::BorderEnforce,
            0,
            self.enforce_interval,
        ));
    }

    /// Cancel all border tasks. Safe to call repeatedly.
    pub fn stop(&mut self, scheduler: &mut Scheduler) {
        scheduler.cancel_slot(&mut self.phase_task);
        scheduler.cancel_slot(&mut self.enforce_task);
        self.state = BorderState::Waiting;
    }

    pub fn is_running(&self) -> bool {
        self.phase_task.is_some() || self.enforce_task.is_some()
    }

    pub fn state(&self) -> BorderState {
        self.state
    }

    pub fn time_remaining(&self) -> u64 {
        self.time_remaining
    }

    pub fn current_size(&self) -> f64 {
        self.current_size
    }

    pub fn center(&self) -> Option<&Position> {
        self.center.as_ref()
    }

    pub fn phase_index(&self) -> usize {
        self.phase_index
    }

    /// Horizontal containment test; height is unconstrained
    pub fn is_inside(&self, pos: &Position) -> bool {
        let Some(center) = &self.center else {
            return false;
        };
        if pos.world != center.world {
            return false;
        }

        let half = self.current_size / 2.0;
        pos.x >= center.x - half
            && pos.x <= center.x + half
            && pos.z >= center.z - half
            && pos.z <= center.z + half
    }

    /// Damage for the active phase, or the last phase once exhausted
    pub fn active_damage(&self) -> f64 {
        self.phases
            .get(self.phase_index)
            .or_else(|| self.phases.last())
            .map(|p| p.damage)
            .unwrap_or(FALLBACK_DAMAGE)
    }

    pub fn view(&self) -> Option<BorderView> {
        let center = self.center.as_ref()?;
        Some(BorderView {
            world: center.world.clone(),
            center_x: center.x,
            center_z: center.z,
            size: self.current_size,
            state: self.state.to_string(),
            time_remaining: self.time_remaining,
            particle: self.visual.particle.clone(),
            particle_count: self.visual.particle_count,
            view_distance: self.visual.view_distance,
            min_y: self.visual.min_y,
            max_y: self.visual.max_y,
            horizontal_density: self.visual.horizontal_density,
            vertical_density: self.visual.vertical_density,
        })
    }

    /// Handle a `BorderPhase` task firing
    pub fn on_phase_tick(&mut self, scheduler: &mut Scheduler) {
        match self.state {
            BorderState::Waiting => {
                if self.time_remaining > 0 {
                    self.time_remaining -= 1;
                } else {
                    scheduler.cancel_slot(&mut self.phase_task);
                    self.begin_shrinking(scheduler);
                }
            }
            BorderState::Shrinking => {
                let Some(phase) = self.phases.get(self.phase_index) else {
                    scheduler.cancel_slot(&mut self.phase_task);
                    self.begin_phase(scheduler);
                    return;
                };

                if self.current_size > phase.target_size {
                    let next = self.current_size - phase.shrink_amount * 2.0;
                    self.current_size = next.max(phase.target_size);
                } else {
                    scheduler.cancel_slot(&mut self.phase_task);
                    self.phase_index += 1;
                    self.begin_phase(scheduler);
                }
            }
            BorderState::Holding => {
                scheduler.cancel_slot(&mut self.phase_task);
            }
        }
    }

    /// Handle a `BorderEnforce` task firing: damage and warn everyone outside
    pub fn enforce(&mut self, now: Tick, players: &[ParticipantId], host: &mut dyn Host) {
        let Some(view) = self.view() else {
            return;
        };
        host.render_border(players, &view);

        let damage = self.active_damage();
        for &who in players {
            if host.mode(who) == Some(Mode::Spectator) {
                continue;
            }
            let Some(location) = host.current_location(who) else {
                continue;
            };
            if location.world != view.world || self.is_inside(&location) {
                continue;
            }

            host.damage(who, damage);

            let notify = match self.last_notice.get(&who) {
                Some(last) => now.saturating_sub(*last) >= self.message_cooldown,
                None => true,
            };
            if notify {
                host.notify(&[who], &Notice::OutsideBorder);
                self.last_notice.insert(who, now);
            }
        }
    }

    fn begin_phase(&mut self, scheduler: &mut Scheduler) {
        let Some(phase) = self.phases.get(self.phase_index) else {
            self.state = BorderState::Holding;
            self.time_remaining = 0;
            debug!(match_id = %self.owner, size = self.current_size, "Border holding");
            return;
        };

        self.state = BorderState::Waiting;
        self.time_remaining = phase.wait_seconds;
        self.phase_task = Some(scheduler.schedule(
            &self.owner,
            TaskKind::BorderPhase,
            0,
            TICKS_PER_SECOND,
        ));
        debug!(
            match_id = %self.owner,
            phase = self.phase_index,
            wait_seconds = phase.wait_seconds,
            "Border phase waiting"
        );
    }

    fn begin_shrinking(&mut self, scheduler: &mut Scheduler) {
        let Some(phase) = self.phases.get(self.phase_index) else {
            self.begin_phase(scheduler);
            return;
        };

        self.state = BorderState::Shrinking;
        self.phase_task = Some(scheduler.schedule(
            &self.owner,
            TaskKind::BorderPhase,
            0,
            phase.shrink_interval_ticks,
        ));
        debug!(
            match_id = %self.owner,
            phase = self.phase_index,
            target = phase.target_size,
            "Border shrinking"
        );
    }
}
