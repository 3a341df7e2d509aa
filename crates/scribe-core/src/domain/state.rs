//! Task state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Task status.
///
/// State transitions:
/// - Pending -> Running -> Completed | Failed | Cancelled
/// - Pending -> Cancelled (cancelled before dispatch)
/// - Pending | Running -> Paused (context cancelled, never re-enqueued)
///
/// Terminal states never transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in the queue.
    Pending,

    /// Currently being executed by a worker.
    Running,

    /// Executor returned successfully.
    Completed,

    /// Executor returned an error (or panicked).
    Failed,

    /// Cancelled before dispatch, or the executor gave up after cancellation.
    Cancelled,

    /// Paused by the caller. A fresh task must be submitted to continue.
    Paused,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled | TaskStatus::Paused
        )
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Pending, Paused)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Running, Paused)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Paused => "paused",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::TaskStatus::*;
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Pending, Running, true)]
    #[case(Pending, Cancelled, true)]
    #[case(Pending, Paused, true)]
    #[case(Pending, Completed, false)]
    #[case(Running, Completed, true)]
    #[case(Running, Failed, true)]
    #[case(Running, Cancelled, true)]
    #[case(Running, Paused, true)]
    #[case(Running, Pending, false)]
    #[case(Completed, Running, false)]
    #[case(Failed, Cancelled, false)]
    #[case(Cancelled, Cancelled, false)]
    #[case(Paused, Pending, false)]
    fn transitions(#[case] from: TaskStatus, #[case] to: TaskStatus, #[case] allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        let all = [Pending, Running, Completed, Failed, Cancelled, Paused];
        for from in all.into_iter().filter(|s| s.is_terminal()) {
            assert!(all.iter().all(|to| !from.can_transition_to(*to)));
        }
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Cancelled).unwrap(), "\"cancelled\"");
        assert_eq!(Paused.to_string(), "paused");
    }
}
