//! Arena rollback journal

use std::collections::HashMap;
use tracing::{info, warn};

use crate::host::{BlockPos, BlockSnapshot, WorldWriter};

/// Outcome of a restore pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    pub failed: usize,
}

/// Original state of every block touched during the current session.
///
/// Only the first snapshot per position is kept, so the journal always holds
/// the pre-match state however often a block changes afterwards. Restore
/// order across positions is unspecified; blocks that depend on a neighbour
/// (attachments) are not ordered after their support.
#[derive(Debug, Default)]
pub struct RollbackJournal {
    entries: HashMap<BlockPos, BlockSnapshot>,
}

impl RollbackJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `original` for `pos` unless the position is already journaled.
    /// Returns true if this call recorded it.
    pub fn record_first_touch(&mut self, pos: BlockPos, original: BlockSnapshot) -> bool {
        if self.entries.contains_key(&pos) {
            return false;
        }
        self.entries.insert(pos, original);
        true
    }

    pub fn snapshot(&self, pos: &BlockPos) -> Option<&BlockSnapshot> {
        self.entries.get(pos)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write every recorded snapshot back, then empty the journal.
    ///
    /// A failing position is logged and skipped; the journal is cleared
    /// regardless so partial state is never applied twice.
    pub fn restore_all<W: WorldWriter + ?Sized>(&mut self, world: &mut W) -> RestoreReport {
        if self.entries.is_empty() {
            return RestoreReport::default();
        }

        let mut report = RestoreReport::default();
        for (pos, snapshot) in self.entries.drain() {
            match world.write_block(&pos, &snapshot) {
                Ok(()) => report.restored += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        world = %pos.world,
                        x = pos.x,
                        y = pos.y,
                        z = pos.z,
                        error = %e,
                        "Failed to restore block"
                    );
                }
            }
        }

        info!(
            restored = report.restored,
            failed = report.failed,
            "Arena rolled back"
        );
        report
    }

    /// Discard everything without replaying it
    pub fn clear(&mut self) -> usize {
        let discarded = self.entries.len();
        self.entries.clear();
        discarded
    }
}
