//! The task that owns the registry and drives it at the host tick rate

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::arena::{ArenaStore, CornerProgress};
use crate::config::GameSettings;
use crate::host::{BridgeHost, Notice, Position, Presenter};
use crate::util::time::{tick_duration, TICKS_PER_SECOND};
use crate::ws::protocol::{HostCommand, HostEvent};

use super::error::MatchError;
use super::r#match::MatchSummary;
use super::registry::MatchRegistry;

/// Inbound queue capacity
const RUNTIME_QUEUE: usize = 1024;

/// Block writes waiting for a bridge before restores start failing
const WORLD_QUEUE: usize = 1 << 16;

/// Block writes shared by every bridge session; each write goes to one bridge
pub type WorldQueue = Arc<Mutex<mpsc::Receiver<HostCommand>>>;

/// Operator requests from the admin API
#[derive(Debug, Clone)]
pub enum AdminCommand {
    CreateMatch {
        max_players: Option<usize>,
        min_players: Option<usize>,
    },
    DeleteMatch { id: String },
    StartMatch { id: Option<String> },
    ResetMatch { id: String },
    ResetAll,
    ListMatches,
    SetArenaCenter { center: Position, size: f64 },
    SetArenaCorner { corner: u8, position: Position },
    SetLobby { position: Position },
    ReloadSettings,
    DiscardJournal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AdminReply {
    Created { id: String },
    Started { id: String },
    Done,
    Matches { matches: Vec<MatchSummary> },
    Corner { defined: bool, size: Option<f64> },
    Discarded { entries: usize },
}

pub enum RuntimeMsg {
    Event(HostEvent),
    Admin {
        command: AdminCommand,
        reply: oneshot::Sender<Result<AdminReply, MatchError>>,
    },
    /// Reset everything, roll the arena back and stop
    Shutdown { done: oneshot::Sender<()> },
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Arena runtime is not running")]
    Stopped,

    #[error(transparent)]
    Denied(#[from] MatchError),
}

/// Snapshot published for the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStatus {
    pub tick: u64,
    pub matches: usize,
    pub running_match: Option<String>,
    pub journal_entries: usize,
    pub bridges: usize,
    pub updated_at: DateTime<Utc>,
}

impl RuntimeStatus {
    fn empty() -> Self {
        Self {
            tick: 0,
            matches: 0,
            running_match: None,
            journal_entries: 0,
            bridges: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Cloneable handle used by the HTTP and WebSocket layers
#[derive(Clone)]
pub struct RuntimeHandle {
    tx: mpsc::Sender<RuntimeMsg>,
    commands: broadcast::Sender<HostCommand>,
    world: WorldQueue,
    status: Arc<RwLock<RuntimeStatus>>,
}

impl RuntimeHandle {
    pub async fn send_event(&self, event: HostEvent) -> Result<(), RuntimeError> {
        self.tx
            .send(RuntimeMsg::Event(event))
            .await
            .map_err(|_| RuntimeError::Stopped)
    }

    pub async fn admin(&self, command: AdminCommand) -> Result<AdminReply, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RuntimeMsg::Admin { command, reply })
            .await
            .map_err(|_| RuntimeError::Stopped)?;

        let result = rx.await.map_err(|_| RuntimeError::Stopped)?;
        Ok(result?)
    }

    /// Ask the runtime to reset all matches and stop; waits until it has
    pub async fn shutdown(&self) {
        let (done, rx) = oneshot::channel();
        if self.tx.send(RuntimeMsg::Shutdown { done }).await.is_ok() {
            let _ = rx.await;
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HostCommand> {
        self.commands.subscribe()
    }

    pub fn world_writes(&self) -> WorldQueue {
        self.world.clone()
    }

    pub fn status(&self) -> RuntimeStatus {
        self.status.read().clone()
    }
}

/// Owns the registry and the bridge host. All match state changes happen
/// on this task.
pub struct ArenaRuntime {
    registry: MatchRegistry,
    host: BridgeHost,
    store: ArenaStore,
    settings_path: PathBuf,
    rx: mpsc::Receiver<RuntimeMsg>,
    status: Arc<RwLock<RuntimeStatus>>,
}

impl ArenaRuntime {
    pub fn new(
        registry: MatchRegistry,
        store: ArenaStore,
        settings_path: PathBuf,
        commands: broadcast::Sender<HostCommand>,
    ) -> (Self, RuntimeHandle) {
        let (tx, rx) = mpsc::channel(RUNTIME_QUEUE);
        let (world_tx, world_rx) = mpsc::channel(WORLD_QUEUE);
        let status = Arc::new(RwLock::new(RuntimeStatus::empty()));

        let handle = RuntimeHandle {
            tx,
            commands: commands.clone(),
            world: Arc::new(Mutex::new(world_rx)),
            status: status.clone(),
        };

        let runtime = Self {
            registry,
            host: BridgeHost::new(commands, world_tx),
            store,
            settings_path,
            rx,
            status,
        };

        (runtime, handle)
    }

    /// Run the tick loop until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        info!(tps = TICKS_PER_SECOND, "Arena runtime started");

        let mut ticker = interval(tick_duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            // Drain inbound messages
            if !self.process_messages() {
                break;
            }

            self.registry.tick(&mut self.host);

            if self.registry.scheduler().now() % TICKS_PER_SECOND == 0 {
                self.publish_status();
            }
        }

        self.publish_status();
        info!("Arena runtime stopped");
    }

    /// Returns false once the runtime should stop
    fn process_messages(&mut self) -> bool {
        loop {
            match self.rx.try_recv() {
                Ok(RuntimeMsg::Event(event)) => self.handle_event(event),
                Ok(RuntimeMsg::Admin { command, reply }) => {
                    let result = self.handle_admin(command);
                    self.publish_status();
                    let _ = reply.send(result);
                }
                Ok(RuntimeMsg::Shutdown { done }) => {
                    self.registry.reset_all(&mut self.host);
                    let _ = done.send(());
                    return false;
                }
                Err(mpsc::error::TryRecvError::Empty) => return true,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    info!("All runtime handles dropped, resetting matches");
                    self.registry.reset_all(&mut self.host);
                    return false;
                }
            }
        }
    }

    fn handle_event(&mut self, event: HostEvent) {
        self.host.apply_event(&event);

        let registry = &mut self.registry;
        let host = &mut self.host;
        match event {
            HostEvent::Presence {
                participant,
                position,
                ..
            }
            | HostEvent::Moved {
                participant,
                position,
            } => registry.on_participant_moved(participant, &position, host),
            HostEvent::Quit { participant } => {
                registry.on_participant_quit(participant, host);
                host.forget(participant);
            }
            HostEvent::Died { participant } => registry.on_participant_died(participant, host),
            HostEvent::Respawn {
                participant,
                request_id,
            } => {
                let position = registry.on_participant_respawn(participant);
                host.send(HostCommand::RespawnAt {
                    participant,
                    request_id,
                    position,
                });
            }
            HostEvent::WorldMutation {
                actor,
                position,
                original,
            } => {
                if registry.on_world_mutation(actor, position, original) {
                    debug!(journal = registry.journal().len(), "Block journaled");
                }
            }
            HostEvent::Command {
                participant,
                request_id,
                line,
            } => {
                let blocked = registry.is_command_blocked(participant, &line);
                if blocked {
                    host.notify(&[participant], &Notice::CommandBlocked);
                }
                host.send(HostCommand::CommandVerdict {
                    participant,
                    request_id,
                    blocked,
                });
            }
            HostEvent::JoinMatch {
                participant,
                match_id,
            } => {
                if let Err(e) = registry.join(match_id.as_deref(), participant, host) {
                    debug!(participant = %participant, reason = %e, "Join denied");
                    host.notify(&[participant], &e.to_notice());
                }
            }
            HostEvent::LeaveMatch { participant } => {
                if let Err(e) = registry.leave(participant, host) {
                    host.notify(&[participant], &e.to_notice());
                }
            }
            HostEvent::ModeChanged { .. }
            | HostEvent::SpectatorFlag { .. }
            | HostEvent::Surface { .. } => {}
        }
    }

    fn handle_admin(&mut self, command: AdminCommand) -> Result<AdminReply, MatchError> {
        info!(?command, "Admin command");
        let host = &mut self.host;

        match command {
            AdminCommand::CreateMatch {
                max_players,
                min_players,
            } => Ok(AdminReply::Created {
                id: self.registry.create(max_players, min_players),
            }),
            AdminCommand::DeleteMatch { id } => {
                self.registry.delete(&id, host)?;
                Ok(AdminReply::Done)
            }
            AdminCommand::StartMatch { id } => {
                let id = self.registry.start(id.as_deref(), host)?;
                Ok(AdminReply::Started { id })
            }
            AdminCommand::ResetMatch { id } => {
                self.registry.reset(&id, host)?;
                Ok(AdminReply::Done)
            }
            AdminCommand::ResetAll => {
                self.registry.reset_all(host);
                Ok(AdminReply::Done)
            }
            AdminCommand::ListMatches => Ok(AdminReply::Matches {
                matches: self.registry.list(),
            }),
            AdminCommand::SetArenaCenter { center, size } => {
                self.registry.set_arena_center(center, size)?;
                self.save_arena();
                Ok(AdminReply::Done)
            }
            AdminCommand::SetArenaCorner { corner, position } => {
                match self.registry.set_arena_corner(corner, position)? {
                    CornerProgress::Pending => Ok(AdminReply::Corner {
                        defined: false,
                        size: None,
                    }),
                    CornerProgress::Defined { size } => {
                        self.save_arena();
                        Ok(AdminReply::Corner {
                            defined: true,
                            size: Some(size),
                        })
                    }
                }
            }
            AdminCommand::SetLobby { position } => {
                self.registry.set_lobby(position);
                self.save_arena();
                Ok(AdminReply::Done)
            }
            AdminCommand::ReloadSettings => {
                self.registry
                    .reload_settings(GameSettings::load(&self.settings_path));
                Ok(AdminReply::Done)
            }
            AdminCommand::DiscardJournal => Ok(AdminReply::Discarded {
                entries: self.registry.discard_journal(),
            }),
        }
    }

    fn save_arena(&self) {
        match self.store.save(self.registry.arena()) {
            Ok(()) => debug!(path = %self.store.path().display(), "Arena saved"),
            Err(e) => warn!(path = %self.store.path().display(), error = %e, "Failed to save arena"),
        }
    }

    fn publish_status(&self) {
        let running_match = self
            .registry
            .list()
            .into_iter()
            .find(|m| m.state.is_running())
            .map(|m| m.id);

        let mut status = self.status.write();
        *status = RuntimeStatus {
            tick: self.registry.scheduler().now(),
            matches: self.registry.len(),
            running_match,
            journal_entries: self.registry.journal().len(),
            bridges: self.host.bridges(),
            updated_at: Utc::now(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Arena, SafeSpotFinder};
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("arena-runtime-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn spawn_runtime(dir: &std::path::Path) -> (RuntimeHandle, broadcast::Receiver<HostCommand>) {
        let (commands, rx) = broadcast::channel(256);
        let registry = MatchRegistry::new(
            GameSettings::default(),
            Arena::default(),
            SafeSpotFinder::new(11),
        );
        let (runtime, handle) = ArenaRuntime::new(
            registry,
            ArenaStore::new(dir.join("arenas.json")),
            dir.join("settings.json"),
            commands,
        );
        tokio::spawn(runtime.run());
        (handle, rx)
    }

    async fn next_notice(rx: &mut broadcast::Receiver<HostCommand>) -> Notice {
        loop {
            let command = timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("timed out waiting for a command")
                .unwrap();
            if let HostCommand::Notice { notice, .. } = command {
                return notice;
            }
        }
    }

    #[tokio::test]
    async fn test_admin_round_trip() {
        let dir = temp_dir();
        let (handle, _rx) = spawn_runtime(&dir);

        let reply = assert_ok!(
            handle
                .admin(AdminCommand::CreateMatch {
                    max_players: Some(8),
                    min_players: None,
                })
                .await
        );
        assert!(matches!(reply, AdminReply::Created { ref id } if id == "game1"));

        let err = assert_err!(
            handle
                .admin(AdminCommand::DeleteMatch {
                    id: "game5".to_string(),
                })
                .await
        );
        assert!(matches!(
            err,
            RuntimeError::Denied(MatchError::MatchNotFound(_))
        ));

        let reply = assert_ok!(handle.admin(AdminCommand::ListMatches).await);
        let AdminReply::Matches { matches } = reply else {
            panic!("unexpected reply");
        };
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].min_players, 4);

        handle.shutdown().await;
        assert_err!(handle.admin(AdminCommand::ListMatches).await);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_arena_changes_are_saved() {
        let dir = temp_dir();
        let (handle, _rx) = spawn_runtime(&dir);

        assert_ok!(
            handle
                .admin(AdminCommand::SetArenaCenter {
                    center: Position::new("world", 0.0, 64.0, 0.0),
                    size: 300.0,
                })
                .await
        );
        let stored = ArenaStore::new(dir.join("arenas.json")).load().unwrap();
        assert_eq!(stored.size(), 300.0);

        let err = assert_err!(
            handle
                .admin(AdminCommand::SetArenaCenter {
                    center: Position::new("world", 0.0, 64.0, 0.0),
                    size: f64::INFINITY,
                })
                .await
        );
        assert!(matches!(
            err,
            RuntimeError::Denied(MatchError::InvalidArenaGeometry(_))
        ));

        handle.shutdown().await;
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_join_event_is_answered_with_notices() {
        let dir = temp_dir();
        let (handle, mut rx) = spawn_runtime(&dir);
        let who = Uuid::new_v4();

        // No match yet
        assert_ok!(
            handle
                .send_event(HostEvent::JoinMatch {
                    participant: who,
                    match_id: None,
                })
                .await
        );
        assert!(matches!(
            next_notice(&mut rx).await,
            Notice::Denied { ref code, .. } if code == "no_matches_available"
        ));

        assert_ok!(
            handle
                .admin(AdminCommand::CreateMatch {
                    max_players: Some(10),
                    min_players: None,
                })
                .await
        );
        assert_ok!(
            handle
                .send_event(HostEvent::Presence {
                    participant: who,
                    name: "alice".to_string(),
                    mode: crate::host::Mode::Survival,
                    position: Position::new("world", 0.0, 64.0, 0.0),
                    forced_spectator: false,
                })
                .await
        );
        assert_ok!(
            handle
                .send_event(HostEvent::JoinMatch {
                    participant: who,
                    match_id: None,
                })
                .await
        );
        assert_eq!(
            next_notice(&mut rx).await,
            Notice::Joined {
                player_name: "alice".to_string(),
                current_players: 1,
                min_players: 5,
            }
        );

        handle.shutdown().await;
        std::fs::remove_dir_all(&dir).ok();
    }
}
