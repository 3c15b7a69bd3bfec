//! Cooperative task bookkeeping.
//!
//! The supervisor owns the authoritative list of spawned commands. Entries
//! are registered under the handler's name when a Spawn-mode command
//! starts, pruned once observed finished, and cancelled in bulk on *RST
//! (non-system tasks) or instrument exit (everything).

use tokio::task::JoinHandle;

/// Names of the blocking-wait commands themselves; never waited on.
pub const WAIT_COMMANDS: &[&str] = &["opc", "opcq", "wai"];

/// Prefix marking system/background tasks exempt from *RST and the
/// blocking-wait commands.
pub const SYSTEM_PREFIX: char = '_';

/// One spawned command.
#[derive(Debug)]
pub struct TaskEntry {
    /// Handler name the task was registered under.
    pub name: &'static str,
    /// Handle to the running task.
    pub handle: JoinHandle<()>,
}

impl TaskEntry {
    fn is_user_task(&self) -> bool {
        !WAIT_COMMANDS.contains(&self.name) && !self.name.starts_with(SYSTEM_PREFIX)
    }
}

/// Tracks spawned commands: registration, pruning and cancellation.
#[derive(Debug, Default)]
pub struct TaskSupervisor {
    entries: Vec<TaskEntry>,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a spawned command under its handler name.
    pub fn register(&mut self, name: &'static str, handle: JoinHandle<()>) {
        self.entries.push(TaskEntry { name, handle });
    }

    /// Drop every entry observed Completed or Cancelled. Running entries
    /// are never removed.
    pub fn prune(&mut self) {
        self.entries.retain(|entry| !entry.handle.is_finished());
    }

    /// Request cancellation of every task and drop all entries.
    pub fn cancel_all(&mut self) {
        for entry in self.entries.drain(..) {
            entry.handle.abort();
        }
    }

    /// Request cancellation of every non-system task and drop those entries.
    pub fn cancel_user(&mut self) {
        self.cancel_where(|name| !name.starts_with(SYSTEM_PREFIX));
    }

    /// Cancel and remove the entries whose name matches the predicate.
    pub fn cancel_where<F>(&mut self, pred: F)
    where
        F: Fn(&str) -> bool,
    {
        let mut kept = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if pred(entry.name) {
                entry.handle.abort();
            } else {
                kept.push(entry);
            }
        }
        self.entries = kept;
    }

    /// True when every task outside the blocking-wait set and the system
    /// namespace has finished. The blocking-wait commands poll this.
    pub fn user_tasks_done(&self) -> bool {
        self.entries
            .iter()
            .filter(|entry| entry.is_user_task())
            .all(|entry| entry.handle.is_finished())
    }

    /// (name, finished) pairs for SYSTem:DEBUg?.
    pub fn snapshot(&self) -> Vec<(&'static str, bool)> {
        self.entries
            .iter()
            .map(|entry| (entry.name, entry.handle.is_finished()))
            .collect()
    }

    /// Number of tracked entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn settle() {
        // Give the runtime a chance to observe task completion.
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn prune_removes_only_finished_tasks() {
        let mut sup = TaskSupervisor::new();
        sup.register("quick", tokio::spawn(async {}));
        sup.register(
            "slow",
            tokio::spawn(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }),
        );
        settle().await;
        sup.prune();
        assert_eq!(sup.snapshot(), vec![("slow", false)]);
        sup.cancel_all();
    }

    #[tokio::test]
    async fn cancel_user_spares_system_tasks() {
        let mut sup = TaskSupervisor::new();
        let forever = || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        };
        sup.register("_display", tokio::spawn(forever()));
        sup.register("sleep", tokio::spawn(forever()));
        sup.cancel_user();
        assert_eq!(sup.len(), 1);
        assert_eq!(sup.snapshot()[0].0, "_display");
        sup.cancel_all();
        assert!(sup.is_empty());
    }

    #[tokio::test]
    async fn user_tasks_done_ignores_wait_commands_and_system_tasks() {
        let mut sup = TaskSupervisor::new();
        assert!(sup.user_tasks_done());

        let forever = || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        };
        sup.register("_display", tokio::spawn(forever()));
        sup.register("opc", tokio::spawn(forever()));
        assert!(sup.user_tasks_done());

        sup.register("sleep", tokio::spawn(async {}));
        settle().await;
        assert!(sup.user_tasks_done());

        sup.register("sleep", tokio::spawn(forever()));
        assert!(!sup.user_tasks_done());
        sup.cancel_all();
    }

    #[tokio::test]
    async fn cancelled_tasks_finish_and_prune() {
        let mut sup = TaskSupervisor::new();
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        handle.abort();
        sup.register("doomed", handle);
        settle().await;
        sup.prune();
        assert!(sup.is_empty());
    }
}
