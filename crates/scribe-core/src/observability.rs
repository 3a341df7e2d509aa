//! Read-only views for pollers (status endpoints, CLI output).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{TaskId, TaskPriority, TaskStatus, TaskType};
use crate::scheduler::Stats;

/// Point-in-time copy of a task.
///
/// Timestamps serialize as RFC 3339, priority as its numeric value and the
/// task type under `"type"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub project_id: String,
    pub status: TaskStatus,
    #[serde(with = "crate::domain::priority::as_value")]
    pub priority: TaskPriority,
    pub progress: f64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl TaskSnapshot {
    /// Wall time between start and completion, if both happened.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        Some(self.completed_at? - self.started_at?)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    #[serde(flatten)]
    pub stats: Stats,
    pub active_workers: usize,
    pub queued_tasks: usize,
    pub worker_count: usize,
}
