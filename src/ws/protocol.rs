//! Bridge protocol message definitions
//! These are the wire types exchanged with the host bridge plugin

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::host::{BlockPos, BlockSnapshot, BorderView, Mode, Notice, Position, StatusBar, Surface};

/// Messages sent from the host bridge to the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// Participant connected, or a full state refresh for one participant
    Presence {
        participant: Uuid,
        name: String,
        mode: Mode,
        position: Position,
        /// Forced-spectator flag the host still holds from before a restart
        #[serde(default)]
        forced_spectator: bool,
    },

    /// Participant moved or teleported
    Moved { participant: Uuid, position: Position },

    /// Mode changed outside the orchestrator's control
    ModeChanged { participant: Uuid, mode: Mode },

    /// Forced-spectator flag changed on the host side
    SpectatorFlag { participant: Uuid, forced: bool },

    /// Participant disconnected
    Quit { participant: Uuid },

    /// Participant died
    Died { participant: Uuid },

    /// Participant is respawning; answered with `RespawnAt`
    Respawn { participant: Uuid, request_id: u64 },

    /// A block is about to change. `actor` is absent for explosions and
    /// other changes without a participant.
    WorldMutation {
        #[serde(default)]
        actor: Option<Uuid>,
        position: BlockPos,
        original: BlockSnapshot,
    },

    /// Participant is about to run a command; answered with `CommandVerdict`
    Command {
        participant: Uuid,
        request_id: u64,
        line: String,
    },

    /// Participant asked to join a match
    JoinMatch {
        participant: Uuid,
        /// Specific match, otherwise the only open match
        #[serde(default)]
        match_id: Option<String>,
    },

    /// Participant asked to leave their match
    LeaveMatch { participant: Uuid },

    /// Surface column report used for landing spot search
    Surface {
        world: String,
        x: i32,
        z: i32,
        surface: Surface,
    },
}

impl HostEvent {
    /// Participant the event concerns, if any
    pub fn participant(&self) -> Option<Uuid> {
        match self {
            HostEvent::Presence { participant, .. }
            | HostEvent::Moved { participant, .. }
            | HostEvent::ModeChanged { participant, .. }
            | HostEvent::SpectatorFlag { participant, .. }
            | HostEvent::Quit { participant }
            | HostEvent::Died { participant }
            | HostEvent::Respawn { participant, .. }
            | HostEvent::Command { participant, .. }
            | HostEvent::JoinMatch { participant, .. }
            | HostEvent::LeaveMatch { participant } => Some(*participant),
            HostEvent::WorldMutation { actor, .. } => *actor,
            HostEvent::Surface { .. } => None,
        }
    }

    /// Frequent position and terrain reports that may be shed under load
    pub fn is_high_volume(&self) -> bool {
        matches!(self, HostEvent::Moved { .. } | HostEvent::Surface { .. })
    }
}

/// Messages sent from the server to the host bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostCommand {
    /// Welcome message after connection
    Welcome { server_time: u64 },

    Teleport { participant: Uuid, position: Position },

    SetMode { participant: Uuid, mode: Mode },

    SetForcedSpectator { participant: Uuid, forced: bool },

    /// Full health and hunger
    RestoreVitals { participant: Uuid },

    Damage { participant: Uuid, amount: f64 },

    Notice { recipients: Vec<Uuid>, notice: Notice },

    /// Notice to everyone on the host
    GlobalNotice { notice: Notice },

    StatusBar { recipients: Vec<Uuid>, bar: StatusBar },

    /// Border wall to draw for the recipients
    BorderView { recipients: Vec<Uuid>, view: BorderView },

    TransitionEffect { participant: Uuid },

    /// Restore a block from the rollback journal
    SetBlock { position: BlockPos, snapshot: BlockSnapshot },

    /// Answer to `Respawn`; no position keeps the host's default
    RespawnAt {
        participant: Uuid,
        request_id: u64,
        position: Option<Position>,
    },

    /// Answer to `Command`
    CommandVerdict {
        participant: Uuid,
        request_id: u64,
        blocked: bool,
    },

    /// Error message
    Error { code: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Terrain;

    #[test]
    fn test_parse_world_mutation_without_actor() {
        let json = r#"{
            "type": "world_mutation",
            "position": { "world": "world", "x": 4, "y": 70, "z": -2 },
            "original": { "material": "CHEST", "tile": { "items": [] } }
        }"#;
        let event: HostEvent = serde_json::from_str(json).unwrap();
        assert!(event.participant().is_none());

        let HostEvent::WorldMutation { position, original, .. } = event else {
            panic!("wrong variant");
        };
        assert_eq!(position.z, -2);
        assert_eq!(original.material, "CHEST");
        assert!(original.data.is_none());
        assert!(original.tile.is_some());
    }

    #[test]
    fn test_parse_presence_and_surface() {
        let id = Uuid::new_v4();
        let json = format!(
            r#"{{"type":"presence","participant":"{}","name":"alice","mode":"SURVIVAL",
                "position":{{"world":"world","x":1.5,"y":64.0,"z":-3.25}}}}"#,
            id
        );
        let event: HostEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.participant(), Some(id));
        assert!(matches!(
            event,
            HostEvent::Presence {
                mode: Mode::Survival,
                forced_spectator: false,
                ..
            }
        ));

        let json = r#"{"type":"surface","world":"world","x":3,"z":9,
            "surface":{"y":71.0,"feet":"air","below":"water","head":"air"}}"#;
        let HostEvent::Surface { surface, .. } = serde_json::from_str::<HostEvent>(json).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(surface.below, Terrain::Water);
    }

    #[test]
    fn test_unknown_event_type_is_rejected() {
        assert!(serde_json::from_str::<HostEvent>(r#"{"type":"fly","participant":"x"}"#).is_err());
    }

    #[test]
    fn test_command_wire_format() {
        let id = Uuid::nil();
        let cmd = HostCommand::Notice {
            recipients: vec![id],
            notice: Notice::GameStarting { time_remaining: 5 },
        };
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["type"], "notice");
        assert_eq!(value["notice"]["notice"], "game_starting");
        assert_eq!(value["notice"]["time_remaining"], 5);

        let verdict = HostCommand::CommandVerdict {
            participant: id,
            request_id: 7,
            blocked: true,
        };
        assert_eq!(serde_json::to_value(&verdict).unwrap()["type"], "command_verdict");
    }
}
