//! Task - スケジューリングの単位
//!
//! `Task` は `Arc<TaskInner>` を包む安価な clone 可能ハンドル。
//! registry / queue / worker / 外部の poller が同じ実体を共有する。
//!
//! # 設計
//! - 不変フィールド（id, type, project_id, params, executor, created_at）はロック不要
//! - 可変フィールドは `Mutex<TaskFields>` 一つにまとめる（await を跨いで保持しない）
//! - 状態遷移は `TaskStatus::can_transition_to` に従い、終端状態からは動かない

mod builder;
mod executor;

pub use builder::TaskBuilder;
pub use executor::{Executor, FnExecutor, TimeoutExecutor, executor_fn};

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::domain::{TaskId, TaskPriority, TaskStatus, TaskType};
use crate::observability::TaskSnapshot;
use crate::ports::Clock;

/// Shared handle to one unit of schedulable work.
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

struct TaskInner {
    id: TaskId,
    task_type: TaskType,
    project_id: String,
    params: serde_json::Value,
    executor: Arc<dyn Executor>,
    created_at: DateTime<Utc>,
    token: CancellationToken,
    clock: Arc<dyn Clock>,
    fields: Mutex<TaskFields>,
}

#[derive(Debug)]
struct TaskFields {
    status: TaskStatus,
    priority: TaskPriority,
    progress: f64,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    result: Option<serde_json::Value>,
    error: Option<String>,
    /// 終端状態を統計に数えたか（一度だけ）
    settled: bool,
}

impl TaskFields {
    /// Apply `next` if it is a legal edge, stamping timestamps on the way.
    fn transition(&mut self, next: TaskStatus, now: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        if next == TaskStatus::Running && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if next.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
        true
    }
}

fn clamp_progress(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) }
}

impl Task {
    pub(crate) fn from_parts(
        id: TaskId,
        task_type: TaskType,
        project_id: String,
        params: serde_json::Value,
        priority: TaskPriority,
        executor: Arc<dyn Executor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let created_at = clock.now();
        Self {
            inner: Arc::new(TaskInner {
                id,
                task_type,
                project_id,
                params,
                executor,
                created_at,
                token: CancellationToken::new(),
                clock,
                fields: Mutex::new(TaskFields {
                    status: TaskStatus::Pending,
                    priority,
                    progress: 0.0,
                    started_at: None,
                    completed_at: None,
                    result: None,
                    error: None,
                    settled: false,
                }),
            }),
        }
    }

    fn fields(&self) -> MutexGuard<'_, TaskFields> {
        self.inner
            .fields
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn task_type(&self) -> &TaskType {
        &self.inner.task_type
    }

    pub fn project_id(&self) -> &str {
        &self.inner.project_id
    }

    pub fn params(&self) -> &serde_json::Value {
        &self.inner.params
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    pub(crate) fn executor(&self) -> Arc<dyn Executor> {
        Arc::clone(&self.inner.executor)
    }

    /// The token handed to the executor. Cancelling it is the only way to
    /// interrupt a running executor.
    pub fn context(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Current time on the task's clock.
    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    pub fn status(&self) -> TaskStatus {
        self.fields().status
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Move to `next` if the state machine allows it.
    ///
    /// Stamps `started_at` on the first move to Running and `completed_at` on
    /// the first move to a terminal state. Returns whether the move happened.
    pub fn set_status(&self, next: TaskStatus) -> bool {
        let now = self.inner.clock.now();
        self.fields().transition(next, now)
    }

    pub fn priority(&self) -> TaskPriority {
        self.fields().priority
    }

    /// Only applied while the task is still Pending.
    ///
    /// The queue orders by the priority seen at submit time, so changing it
    /// after `submit` only affects what pollers see.
    pub fn set_priority(&self, priority: TaskPriority) -> bool {
        let mut fields = self.fields();
        if fields.status != TaskStatus::Pending {
            return false;
        }
        fields.priority = priority;
        true
    }

    pub fn progress(&self) -> f64 {
        self.fields().progress
    }

    pub fn set_progress(&self, progress: f64) {
        self.fields().progress = clamp_progress(progress);
    }

    pub fn increment_progress(&self, delta: f64) {
        let mut fields = self.fields();
        fields.progress = clamp_progress(fields.progress + delta);
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.fields().started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.fields().completed_at
    }

    pub fn result(&self) -> Option<serde_json::Value> {
        self.fields().result.clone()
    }

    pub fn set_result(&self, result: serde_json::Value) {
        self.fields().result = Some(result);
    }

    pub fn error(&self) -> Option<String> {
        self.fields().error.clone()
    }

    pub fn set_error(&self, error: impl fmt::Display) {
        self.fields().error = Some(error.to_string());
    }

    /// Cancel the task's token.
    ///
    /// A Pending task moves straight to Cancelled. A Running task keeps its
    /// status until the executor returns. Returns true only when this call
    /// moved the task to Cancelled, so repeated calls never double count.
    pub fn cancel(&self) -> bool {
        let now = self.inner.clock.now();
        let mut fields = self.fields();
        self.inner.token.cancel();
        fields.status == TaskStatus::Pending && fields.transition(TaskStatus::Cancelled, now)
    }

    /// Mark Paused and cancel the token. No-op on terminal tasks.
    pub fn pause(&self) -> bool {
        let now = self.inner.clock.now();
        let mut fields = self.fields();
        let moved = fields.transition(TaskStatus::Paused, now);
        if moved {
            self.inner.token.cancel();
        }
        moved
    }

    /// Running -> Completed, progress pinned to 100.
    pub(crate) fn mark_completed(&self) -> bool {
        let now = self.inner.clock.now();
        let mut fields = self.fields();
        let moved = fields.transition(TaskStatus::Completed, now);
        if moved {
            fields.progress = 100.0;
        }
        moved
    }

    /// Running -> Failed, recording the error message.
    pub(crate) fn mark_failed(&self, error: &crate::error::ExecutionError) -> bool {
        let now = self.inner.clock.now();
        let mut fields = self.fields();
        let moved = fields.transition(TaskStatus::Failed, now);
        if moved {
            fields.error = Some(error.to_string());
        }
        moved
    }

    /// Hand out the terminal status exactly once.
    ///
    /// Returns `None` while the task is not terminal or after the first
    /// successful call. Every path that can observe a finished task (cancel,
    /// pause, dispatch, worker completion) goes through this, so whichever
    /// gets there first does the counting.
    pub(crate) fn take_settlement(&self) -> Option<TaskStatus> {
        let mut fields = self.fields();
        if fields.settled || !fields.status.is_terminal() {
            return None;
        }
        fields.settled = true;
        Some(fields.status)
    }

    /// Point-in-time copy of every inspectable field.
    pub fn snapshot(&self) -> TaskSnapshot {
        let fields = self.fields();
        TaskSnapshot {
            id: self.inner.id,
            task_type: self.inner.task_type.clone(),
            project_id: self.inner.project_id.clone(),
            status: fields.status,
            priority: fields.priority,
            progress: fields.progress,
            created_at: self.inner.created_at,
            started_at: fields.started_at,
            completed_at: fields.completed_at,
            error: fields.error.clone(),
            params: self.inner.params.clone(),
            result: fields.result.clone(),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.fields();
        write!(
            f,
            "Task[{}:{}] status={} progress={:.1}%",
            self.inner.task_type,
            self.inner.id.short(),
            fields.status,
            fields.progress
        )
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("task_type", &self.inner.task_type)
            .field("project_id", &self.inner.project_id)
            .field("fields", &*self.fields())
            .finish_non_exhaustive()
    }
}
