use std::time::Duration;

use thiserror::Error;

use crate::domain::{TaskId, TaskStatus};

/// Errors returned synchronously by the scheduler API.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler is stopped")]
    Stopped,

    #[error("scheduler is already started")]
    AlreadyStarted,

    #[error("task {0} already exists")]
    DuplicateTask(TaskId),

    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("task {id} is {status}, only pending tasks can be submitted")]
    NotPending { id: TaskId, status: TaskStatus },

    #[error("no scheduler assigned")]
    NoScheduler,
}

impl SchedulerError {
    /// Machine readable code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::Stopped => "SCHEDULER_STOPPED",
            SchedulerError::AlreadyStarted => "SCHEDULER_STARTED",
            SchedulerError::DuplicateTask(_) => "TASK_EXISTS",
            SchedulerError::TaskNotFound(_) => "TASK_NOT_FOUND",
            SchedulerError::NotPending { .. } => "TASK_NOT_PENDING",
            SchedulerError::NoScheduler => "NO_SCHEDULER",
        }
    }
}

/// Error returned by an executor.
///
/// Only recorded on the task when it ends up `Failed`; an executor that
/// returns any of these after its token was cancelled is classified
/// `Cancelled` instead.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("cancelled")]
    Cancelled,

    #[error("invalid params for task_type={task_type}: {source}")]
    InvalidParams {
        task_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("executor panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}

impl ExecutionError {
    pub fn failed(msg: impl std::fmt::Display) -> Self {
        ExecutionError::Failed(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(SchedulerError::Stopped.code(), "SCHEDULER_STOPPED");
        assert_eq!(
            SchedulerError::TaskNotFound(TaskId::generate()).code(),
            "TASK_NOT_FOUND"
        );
    }

    #[test]
    fn failed_message_is_passed_through() {
        let err = ExecutionError::failed("llm returned 502");
        assert_eq!(err.to_string(), "llm returned 502");
    }
}
