//! Executor - タスクの実処理
//!
//! # 契約
//! - `ctx`（= task のキャンセルトークン）を定期的に確認し、キャンセルされたら早めに返る
//! - 進捗は `task.set_progress` / `ProgressTracker` で報告する
//! - `Ok(())` なら Completed、`Err` なら Failed（ただしトークンがキャンセル済みなら Cancelled）

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::Task;
use crate::error::ExecutionError;

/// Performs the actual work of a task.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, ctx: CancellationToken, task: Task) -> Result<(), ExecutionError>;
}

/// Adapts an async closure to [`Executor`].
pub struct FnExecutor<F> {
    f: F,
}

impl<F, Fut> FnExecutor<F>
where
    F: Fn(CancellationToken, Task) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ExecutionError>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Executor for FnExecutor<F>
where
    F: Fn(CancellationToken, Task) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ExecutionError>> + Send + 'static,
{
    async fn execute(&self, ctx: CancellationToken, task: Task) -> Result<(), ExecutionError> {
        (self.f)(ctx, task).await
    }
}

pub fn executor_fn<F, Fut>(f: F) -> Arc<dyn Executor>
where
    F: Fn(CancellationToken, Task) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ExecutionError>> + Send + 'static,
{
    Arc::new(FnExecutor::new(f))
}

/// Cancels the task once `timeout` elapses.
///
/// The inner executor is still awaited after cancellation (cooperative), and
/// the result is replaced with [`ExecutionError::Timeout`]. Because the token
/// is set by then, the worker records the task as Cancelled.
pub struct TimeoutExecutor {
    inner: Arc<dyn Executor>,
    timeout: Duration,
}

impl TimeoutExecutor {
    pub fn new(inner: Arc<dyn Executor>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl Executor for TimeoutExecutor {
    async fn execute(&self, ctx: CancellationToken, task: Task) -> Result<(), ExecutionError> {
        let task_id = task.id();
        let fut = self.inner.execute(ctx.clone(), task);
        tokio::pin!(fut);

        tokio::select! {
            res = &mut fut => res,
            _ = tokio::time::sleep(self.timeout) => {
                warn!(%task_id, timeout = ?self.timeout, "task timed out, cancelling");
                ctx.cancel();
                let _ = fut.await;
                Err(ExecutionError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskType;
    use crate::task::TaskBuilder;

    fn task_with(executor: Arc<dyn Executor>) -> Task {
        TaskBuilder::new(TaskType::SCENE_GEN, "p", serde_json::Value::Null, executor).build()
    }

    #[tokio::test]
    async fn fn_executor_passes_task_through() {
        let exec = executor_fn(|_ctx, task: Task| async move {
            task.set_result(serde_json::json!(task.project_id()));
            Ok(())
        });
        let task = task_with(exec.clone());
        exec.execute(task.context(), task.clone()).await.unwrap();
        assert_eq!(task.result(), Some(serde_json::json!("p")));
    }

    #[tokio::test]
    async fn timeout_cancels_slow_executor() {
        let slow = executor_fn(|ctx: CancellationToken, _task| async move {
            ctx.cancelled().await;
            Err(ExecutionError::Cancelled)
        });
        let exec = TimeoutExecutor::new(slow, Duration::from_millis(20));
        let task = task_with(executor_fn(|_, _| async { Ok(()) }));

        let err = exec.execute(task.context(), task.clone()).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Timeout(_)));
        assert!(task.is_cancelled());
    }

    #[tokio::test]
    async fn timeout_passes_fast_result_through() {
        let fast = executor_fn(|_, _| async { Err(ExecutionError::failed("boom")) });
        let exec = TimeoutExecutor::new(fast, Duration::from_secs(5));
        let task = task_with(executor_fn(|_, _| async { Ok(()) }));

        let err = exec.execute(task.context(), task.clone()).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(!task.is_cancelled());
    }
}
