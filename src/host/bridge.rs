//! Host implementation backed by the WebSocket bridge
//!
//! Queries are answered from caches fed by inbound `HostEvent`s; every
//! action becomes a `HostCommand` broadcast to the connected bridges.
//! Block writes go through a bounded queue instead, so a write that cannot
//! be delivered is reported to the caller rather than lost to lag.

use std::collections::{HashMap, HashSet};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::ws::protocol::{HostCommand, HostEvent};

use super::{
    BlockPos, BlockSnapshot, BorderView, LocationService, Mode, ModeService, Notice,
    ParticipantId, Position, Presenter, StatusBar, Surface, Vitals, WorldError, WorldWriter,
};

/// Surface columns kept before the cache is dropped and refilled
const MAX_SURFACE_COLUMNS: usize = 1 << 16;

pub struct BridgeHost {
    commands: broadcast::Sender<HostCommand>,
    world: mpsc::Sender<HostCommand>,
    locations: HashMap<ParticipantId, Position>,
    modes: HashMap<ParticipantId, Mode>,
    names: HashMap<ParticipantId, String>,
    forced: HashSet<ParticipantId>,
    surfaces: HashMap<(String, i32, i32), Surface>,
}

impl BridgeHost {
    pub fn new(commands: broadcast::Sender<HostCommand>, world: mpsc::Sender<HostCommand>) -> Self {
        Self {
            commands,
            world,
            locations: HashMap::new(),
            modes: HashMap::new(),
            names: HashMap::new(),
            forced: HashSet::new(),
            surfaces: HashMap::new(),
        }
    }

    /// Number of connected bridges
    pub fn bridges(&self) -> usize {
        self.commands.receiver_count()
    }

    /// Queue a command for every bridge. Returns false if none is connected.
    pub fn send(&self, command: HostCommand) -> bool {
        match self.commands.send(command) {
            Ok(_) => true,
            Err(broadcast::error::SendError(command)) => {
                debug!(?command, "No bridge connected, command dropped");
                false
            }
        }
    }

    /// Update the caches from an inbound event
    pub fn apply_event(&mut self, event: &HostEvent) {
        match event {
            HostEvent::Presence {
                participant,
                name,
                mode,
                position,
                forced_spectator,
            } => {
                self.names.insert(*participant, name.clone());
                self.modes.insert(*participant, *mode);
                self.locations.insert(*participant, position.clone());
                if *forced_spectator {
                    self.forced.insert(*participant);
                } else {
                    self.forced.remove(participant);
                }
            }
            HostEvent::Moved {
                participant,
                position,
            } => {
                self.locations.insert(*participant, position.clone());
            }
            HostEvent::ModeChanged { participant, mode } => {
                self.modes.insert(*participant, *mode);
            }
            HostEvent::SpectatorFlag {
                participant,
                forced,
            } => {
                if *forced {
                    self.forced.insert(*participant);
                } else {
                    self.forced.remove(participant);
                }
            }
            HostEvent::Surface {
                world,
                x,
                z,
                surface,
            } => {
                if self.surfaces.len() >= MAX_SURFACE_COLUMNS {
                    self.surfaces.clear();
                }
                self.surfaces.insert((world.clone(), *x, *z), *surface);
            }
            _ => {}
        }
    }

    /// Drop everything cached about a participant that disconnected.
    /// The forced-spectator flag is kept since the host persists it.
    pub fn forget(&mut self, who: ParticipantId) {
        self.locations.remove(&who);
        self.modes.remove(&who);
        self.names.remove(&who);
    }
}

impl LocationService for BridgeHost {
    fn current_location(&self, who: ParticipantId) -> Option<Position> {
        self.locations.get(&who).cloned()
    }

    fn teleport(&mut self, who: ParticipantId, to: &Position) {
        self.locations.insert(who, to.clone());
        self.send(HostCommand::Teleport {
            participant: who,
            position: to.clone(),
        });
    }

    fn surface_at(&self, world: &str, x: i32, z: i32) -> Option<Surface> {
        self.surfaces.get(&(world.to_string(), x, z)).copied()
    }
}

impl Presenter for BridgeHost {
    fn notify(&mut self, recipients: &[ParticipantId], notice: &Notice) {
        self.send(HostCommand::Notice {
            recipients: recipients.to_vec(),
            notice: notice.clone(),
        });
    }

    fn notify_all(&mut self, notice: &Notice) {
        self.send(HostCommand::GlobalNotice {
            notice: notice.clone(),
        });
    }

    fn status_bar(&mut self, recipients: &[ParticipantId], bar: &StatusBar) {
        if recipients.is_empty() {
            return;
        }
        self.send(HostCommand::StatusBar {
            recipients: recipients.to_vec(),
            bar: bar.clone(),
        });
    }

    fn render_border(&mut self, recipients: &[ParticipantId], view: &BorderView) {
        if recipients.is_empty() {
            return;
        }
        self.send(HostCommand::BorderView {
            recipients: recipients.to_vec(),
            view: view.clone(),
        });
    }

    fn transition_effect(&mut self, who: ParticipantId) {
        self.send(HostCommand::TransitionEffect { participant: who });
    }
}

impl ModeService for BridgeHost {
    fn mode(&self, who: ParticipantId) -> Option<Mode> {
        self.modes.get(&who).copied()
    }

    fn set_mode(&mut self, who: ParticipantId, mode: Mode) {
        self.modes.insert(who, mode);
        self.send(HostCommand::SetMode {
            participant: who,
            mode,
        });
    }

    fn is_forced_spectator(&self, who: ParticipantId) -> bool {
        self.forced.contains(&who)
    }

    fn set_forced_spectator(&mut self, who: ParticipantId, forced: bool) {
        if forced {
            self.forced.insert(who);
        } else {
            self.forced.remove(&who);
        }
        self.send(HostCommand::SetForcedSpectator {
            participant: who,
            forced,
        });
    }
}

impl Vitals for BridgeHost {
    fn restore_vitals(&mut self, who: ParticipantId) {
        self.send(HostCommand::RestoreVitals { participant: who });
    }

    fn damage(&mut self, who: ParticipantId, amount: f64) {
        self.send(HostCommand::Damage {
            participant: who,
            amount,
        });
    }

    fn display_name(&self, who: ParticipantId) -> Option<String> {
        self.names.get(&who).cloned()
    }
}

impl WorldWriter for BridgeHost {
    fn write_block(&mut self, pos: &BlockPos, snapshot: &BlockSnapshot) -> Result<(), WorldError> {
        if self.bridges() == 0 {
            return Err(WorldError::Unavailable);
        }

        let command = HostCommand::SetBlock {
            position: pos.clone(),
            snapshot: snapshot.clone(),
        };
        self.world.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => WorldError::Backlogged,
            mpsc::error::TrySendError::Closed(_) => WorldError::Unavailable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::rollback::{RestoreReport, RollbackJournal};
    use uuid::Uuid;

    fn host() -> (BridgeHost, broadcast::Receiver<HostCommand>) {
        let (tx, rx) = broadcast::channel(64);
        let (world, _) = mpsc::channel(64);
        (BridgeHost::new(tx, world), rx)
    }

    fn block(x: i32) -> BlockPos {
        BlockPos {
            world: "world".to_string(),
            x,
            y: 64,
            z: 0,
        }
    }

    fn stone() -> BlockSnapshot {
        BlockSnapshot {
            material: "STONE".to_string(),
            data: None,
            tile: None,
        }
    }

    #[test]
    fn test_presence_fills_caches() {
        let (mut host, _rx) = host();
        let id = Uuid::new_v4();
        host.apply_event(&HostEvent::Presence {
            participant: id,
            name: "alice".to_string(),
            mode: Mode::Creative,
            position: Position::new("world", 1.0, 64.0, 2.0),
            forced_spectator: true,
        });

        assert_eq!(host.display_name(id).as_deref(), Some("alice"));
        assert_eq!(host.mode(id), Some(Mode::Creative));
        assert!(host.is_forced_spectator(id));
        assert_eq!(host.current_location(id).unwrap().z, 2.0);

        host.forget(id);
        assert!(host.display_name(id).is_none());
        assert!(host.is_forced_spectator(id));
    }

    #[test]
    fn test_actions_become_commands() {
        let (mut host, mut rx) = host();
        let id = Uuid::new_v4();
        let to = Position::new("world", 5.0, 70.0, 5.0);

        host.teleport(id, &to);
        host.set_mode(id, Mode::Spectator);

        assert_eq!(
            rx.try_recv().unwrap(),
            HostCommand::Teleport {
                participant: id,
                position: to.clone(),
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            HostCommand::SetMode {
                participant: id,
                mode: Mode::Spectator,
            }
        );
        assert_eq!(host.current_location(id), Some(to));
    }

    #[test]
    fn test_write_block_needs_a_bridge() {
        let (tx, rx) = broadcast::channel(8);
        let (world, mut world_rx) = mpsc::channel(8);
        let mut host = BridgeHost::new(tx, world);

        assert!(host.write_block(&block(0), &stone()).is_ok());
        assert!(matches!(
            world_rx.try_recv().unwrap(),
            HostCommand::SetBlock { .. }
        ));

        drop(rx);
        assert!(matches!(
            host.write_block(&block(0), &stone()),
            Err(WorldError::Unavailable)
        ));
    }

    #[test]
    fn test_restore_counts_writes_the_queue_refused() {
        let (tx, mut commands) = broadcast::channel(64);
        let (world, mut world_rx) = mpsc::channel(4);
        let mut host = BridgeHost::new(tx, world);

        let mut journal = RollbackJournal::new();
        for x in 0..10 {
            journal.record_first_touch(block(x), stone());
        }

        let report = journal.restore_all(&mut host);
        assert_eq!(report, RestoreReport { restored: 4, failed: 6 });

        let mut delivered = 0;
        while let Ok(command) = world_rx.try_recv() {
            assert!(matches!(command, HostCommand::SetBlock { .. }));
            delivered += 1;
        }
        assert_eq!(delivered, 4);
        assert!(commands.try_recv().is_err());
    }

    #[test]
    fn test_empty_status_bar_is_not_sent() {
        let (mut host, mut rx) = host();
        host.status_bar(&[], &StatusBar::Countdown { time_remaining: 3 });
        assert!(rx.try_recv().is_err());
    }
}
