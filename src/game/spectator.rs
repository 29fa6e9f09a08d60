//! Forced spectators: bystanders standing inside the arena

use std::collections::HashMap;
use tracing::debug;

use crate::host::{Host, Mode, ParticipantId};

/// Mode each forced spectator had before being flagged
#[derive(Debug, Default)]
pub struct ForcedSpectators {
    previous_modes: HashMap<ParticipantId, Mode>,
}

impl ForcedSpectators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.previous_modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.previous_modes.is_empty()
    }

    /// Flag `who` and switch them to `mode`. Returns false if already flagged.
    pub fn enter(&mut self, who: ParticipantId, mode: Mode, host: &mut dyn Host) -> bool {
        if host.is_forced_spectator(who) {
            return false;
        }

        let previous = host.mode(who).unwrap_or(Mode::Survival);
        self.previous_modes.insert(who, previous);
        host.set_forced_spectator(who, true);
        host.set_mode(who, mode);
        debug!(participant = %who, previous = %previous, "Forced spectator");
        true
    }

    /// Clear the flag and give back the previous mode (SURVIVAL if unknown).
    /// Returns false if `who` was not flagged.
    pub fn release(&mut self, who: ParticipantId, host: &mut dyn Host) -> bool {
        let previous = self.previous_modes.remove(&who);
        if !host.is_forced_spectator(who) {
            return false;
        }

        host.set_forced_spectator(who, false);
        host.set_mode(who, previous.unwrap_or(Mode::Survival));
        debug!(participant = %who, "Forced spectator released");
        true
    }
}
