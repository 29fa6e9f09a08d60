//! Virtual tick clock and repeating tasks
//!
//! Every timer in the arena (countdowns, border phases, border enforcement,
//! status bars) is a task registered here. The runtime advances the clock one
//! tick at a time and routes due tasks to their owning match, so tests can
//! drive whole matches deterministically by calling [`Scheduler::advance`].

use std::collections::BTreeMap;

pub type Tick = u64;

/// Handle used to cancel a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

/// What a task does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Countdown,
    BorderPhase,
    BorderEnforce,
    StatusBar,
}

#[derive(Debug, Clone)]
struct Task {
    owner: String,
    kind: TaskKind,
    interval: Tick,
    next_due: Tick,
}

/// A task that came due on the current tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueTask {
    pub id: TaskId,
    pub owner: String,
    pub kind: TaskKind,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    now: Tick,
    next_id: u64,
    tasks: BTreeMap<TaskId, Task>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tick
    pub fn now(&self) -> Tick {
        self.now
    }

    /// Schedule a repeating task. It first fires `delay` ticks from now
    /// (at least one), then every `interval` ticks.
    pub fn schedule(&mut self, owner: &str, kind: TaskKind, delay: Tick, interval: Tick) -> TaskId {
        self.next_id += 1;
        let id = TaskId(self.next_id);
        self.tasks.insert(
            id,
            Task {
                owner: owner.to_string(),
                kind,
                interval: interval.max(1),
                next_due: self.now + delay.max(1),
            },
        );
        id
    }

    /// Cancel a task. Cancelling an unknown or already cancelled task is a no-op.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        self.tasks.remove(&id).is_some()
    }

    /// Cancel an optional handle and clear it
    pub fn cancel_slot(&mut self, slot: &mut Option<TaskId>) {
        if let Some(id) = slot.take() {
            self.cancel(id);
        }
    }

    /// Cancel every task owned by `owner`
    pub fn cancel_owner(&mut self, owner: &str) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, task| task.owner != owner);
        before - self.tasks.len()
    }

    pub fn is_active(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    pub fn pending_for(&self, owner: &str) -> usize {
        self.tasks.values().filter(|t| t.owner == owner).count()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Advance the clock one tick and return the tasks due on it, ordered by
    /// due tick then id. Callers must skip tasks that an earlier task in the
    /// same batch cancelled (see [`Scheduler::is_active`]).
    pub fn advance(&mut self) -> Vec<DueTask> {
        self.now += 1;
        let now = self.now;

        let mut due: Vec<(Tick, TaskId)> = self
            .tasks
            .iter()
            .filter(|(_, task)| task.next_due <= now)
            .map(|(id, task)| (task.next_due, *id))
            .collect();
        due.sort_unstable();

        due.into_iter()
            .filter_map(|(_, id)| {
                let task = self.tasks.get_mut(&id)?;
                task.next_due = now + task.interval;
                Some(DueTask {
                    id,
                    owner: task.owner.clone(),
                    kind: task.kind,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fire_ticks(scheduler: &mut Scheduler, ticks: u64) -> Vec<(Tick, TaskKind)> {
        let mut fired = Vec::new();
        for _ in 0..ticks {
            for task in scheduler.advance() {
                fired.push((scheduler.now(), task.kind));
            }
        }
        fired
    }

    #[test]
    fn test_repeating_interval() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule("game1", TaskKind::Countdown, 0, 20);

        let fired = fire_ticks(&mut scheduler, 45);
        let ticks: Vec<Tick> = fired.iter().map(|(t, _)| *t).collect();
        assert_eq!(ticks, vec![1, 21, 41]);
    }

    #[test]
    fn test_delay_is_honoured() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule("game1", TaskKind::StatusBar, 10, 5);

        let fired = fire_ticks(&mut scheduler, 20);
        let ticks: Vec<Tick> = fired.iter().map(|(t, _)| *t).collect();
        assert_eq!(ticks, vec![10, 15, 20]);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.schedule("game1", TaskKind::BorderPhase, 0, 1);

        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        assert!(fire_ticks(&mut scheduler, 5).is_empty());
    }

    #[test]
    fn test_cancel_slot_clears_handle() {
        let mut scheduler = Scheduler::new();
        let mut slot = Some(scheduler.schedule("game1", TaskKind::BorderPhase, 0, 1));

        scheduler.cancel_slot(&mut slot);
        assert!(slot.is_none());
        scheduler.cancel_slot(&mut slot);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_cancel_owner_leaves_others() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule("game1", TaskKind::BorderPhase, 0, 1);
        scheduler.schedule("game1", TaskKind::BorderEnforce, 0, 5);
        scheduler.schedule("game2", TaskKind::Countdown, 0, 20);

        assert_eq!(scheduler.cancel_owner("game1"), 2);
        assert_eq!(scheduler.pending_for("game1"), 0);
        assert_eq!(scheduler.pending_for("game2"), 1);
    }

    #[test]
    fn test_due_order_is_stable() {
        let mut scheduler = Scheduler::new();
        let a = scheduler.schedule("game1", TaskKind::BorderEnforce, 0, 1);
        let b = scheduler.schedule("game1", TaskKind::BorderPhase, 0, 1);

        let due = scheduler.advance();
        let ids: Vec<TaskId> = due.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![a, b]);
    }
}
