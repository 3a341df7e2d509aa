use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{Executor, FnExecutor, Task};
use crate::domain::{TaskId, TaskPriority, TaskType};
use crate::error::{ExecutionError, SchedulerError};
use crate::ports::{Clock, SystemClock};
use crate::scheduler::Scheduler;

/// TaskBuilder は Task を組み立てる
///
/// # 使用例
/// ```ignore
/// let task = TaskBuilder::from_fn(TaskType::WORLD_BUILD, "project-1", params, |ctx, task| async move {
///     // ...
///     Ok(())
/// })
/// .priority(TaskPriority::High)
/// .scheduler(&scheduler)
/// .submit()?;
/// ```
pub struct TaskBuilder {
    task_type: TaskType,
    project_id: String,
    params: serde_json::Value,
    executor: Arc<dyn Executor>,
    priority: TaskPriority,
    id: Option<TaskId>,
    clock: Arc<dyn Clock>,
    scheduler: Option<Arc<Scheduler>>,
}

impl fmt::Debug for TaskBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // executor / clock / scheduler は出さない
        f.debug_struct("TaskBuilder")
            .field("task_type", &self.task_type)
            .field("project_id", &self.project_id)
            .field("priority", &self.priority)
            .field("id", &self.id)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl TaskBuilder {
    pub fn new(
        task_type: TaskType,
        project_id: impl Into<String>,
        params: serde_json::Value,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            task_type,
            project_id: project_id.into(),
            params,
            executor,
            priority: TaskPriority::default(),
            id: None,
            clock: Arc::new(SystemClock),
            scheduler: None,
        }
    }

    /// Closure executor の糖衣
    pub fn from_fn<F, Fut>(
        task_type: TaskType,
        project_id: impl Into<String>,
        params: serde_json::Value,
        f: F,
    ) -> Self
    where
        F: Fn(CancellationToken, Task) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ExecutionError>> + Send + 'static,
    {
        Self::new(task_type, project_id, params, Arc::new(FnExecutor::new(f)))
    }

    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Use a caller-chosen ID instead of a freshly generated one.
    pub fn id(mut self, id: TaskId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn scheduler(mut self, scheduler: &Arc<Scheduler>) -> Self {
        self.scheduler = Some(Arc::clone(scheduler));
        self
    }

    pub fn build(self) -> Task {
        Task::from_parts(
            self.id.unwrap_or_else(TaskId::generate),
            self.task_type,
            self.project_id,
            self.params,
            self.priority,
            self.executor,
            self.clock,
        )
    }

    /// Build and submit to the scheduler set with [`TaskBuilder::scheduler`].
    pub fn submit(mut self) -> Result<Task, SchedulerError> {
        let scheduler = self.scheduler.take().ok_or(SchedulerError::NoScheduler)?;
        let task = self.build();
        scheduler.submit(task.clone())?;
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskStatus;
    use crate::scheduler::SchedulerConfig;

    fn builder() -> TaskBuilder {
        TaskBuilder::from_fn(
            TaskType::EXPORT,
            "p",
            serde_json::Value::Null,
            |_ctx, _task| async { Ok(()) },
        )
    }

    #[test]
    fn explicit_id_and_priority_are_kept() {
        let id = TaskId::generate();
        let task = builder().id(id).priority(TaskPriority::Low).build();
        assert_eq!(task.id(), id);
        assert_eq!(task.priority(), TaskPriority::Low);
        assert_eq!(task.task_type(), &TaskType::EXPORT);
    }

    #[test]
    fn submit_without_scheduler_fails() {
        let err = builder().submit().unwrap_err();
        assert!(matches!(err, SchedulerError::NoScheduler));
    }

    #[test]
    fn debug_omits_executor() {
        let out = format!("{:?}", builder().priority(TaskPriority::High));
        assert!(out.starts_with("TaskBuilder"));
        assert!(out.contains("High"));
        assert!(!out.contains("executor"));
    }

    #[tokio::test]
    async fn submit_registers_task() {
        let scheduler = Arc::new(Scheduler::new(SchedulerConfig::default()));
        let task = builder().scheduler(&scheduler).submit().unwrap();

        let found = scheduler.get_task(task.id()).unwrap();
        assert_eq!(found.status(), TaskStatus::Pending);
        assert_eq!(scheduler.queue_size(), 1);
    }
}
