use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Process-wide task counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    /// Includes paused tasks.
    pub cancelled_tasks: u64,
}

impl Stats {
    /// Tasks that reached a terminal state.
    pub fn finished(&self) -> u64 {
        self.completed_tasks + self.failed_tasks + self.cancelled_tasks
    }

    /// Tasks submitted but not yet terminal.
    pub fn in_flight(&self) -> u64 {
        self.total_tasks.saturating_sub(self.finished())
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    total: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_submitted(&self) {
        self.total.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn snapshot(&self) -> Stats {
        // terminal counters first: total is always bumped before them, so the
        // snapshot never shows finished > total
        let completed_tasks = self.completed.load(Ordering::Acquire);
        let failed_tasks = self.failed.load(Ordering::Acquire);
        let cancelled_tasks = self.cancelled.load(Ordering::Acquire);
        let total_tasks = self.total.load(Ordering::Acquire);
        Stats {
            total_tasks,
            completed_tasks,
            failed_tasks,
            cancelled_tasks,
        }
    }
}
