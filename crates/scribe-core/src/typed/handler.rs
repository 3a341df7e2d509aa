//! Handler trait - 型付き executor
//!
//! - `Handler<P>` は decode 済みの params を受け取る
//! - `TypedExecutor<P, H>` が `Executor` (object-safe) への橋渡しをする

use std::marker::PhantomData;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::params::TaskParams;
use crate::error::ExecutionError;
use crate::task::{Executor, Task};

/// Executes tasks whose params decode to `P`.
///
/// ```ignore
/// struct WorldBuilder;
///
/// #[async_trait]
/// impl Handler<WorldParams> for WorldBuilder {
///     async fn handle(&self, params: WorldParams, ctx: CancellationToken, task: Task)
///         -> Result<(), ExecutionError>
///     {
///         task.set_result(json!({ "regions": params.regions }));
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<P: TaskParams>: Send + Sync {
    async fn handle(&self, params: P, ctx: CancellationToken, task: Task) -> Result<(), ExecutionError>;
}

/// Decodes `task.params()` into `P` and calls the handler.
///
/// A decode failure fails the task with [`ExecutionError::InvalidParams`].
pub struct TypedExecutor<P: TaskParams, H: Handler<P>> {
    handler: H,
    _marker: PhantomData<fn() -> P>,
}

impl<P: TaskParams, H: Handler<P>> TypedExecutor<P, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<P: TaskParams, H: Handler<P>> Executor for TypedExecutor<P, H> {
    async fn execute(&self, ctx: CancellationToken, task: Task) -> Result<(), ExecutionError> {
        let params: P = serde_json::from_value(task.params().clone()).map_err(|source| {
            ExecutionError::InvalidParams {
                task_type: P::TYPE.to_string(),
                source,
            }
        })?;
        self.handler.handle(params, ctx, task).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskType;
    use crate::task::TaskBuilder;
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;

    #[derive(Debug, Serialize, Deserialize)]
    struct SceneParams {
        chapter: u32,
        scene: u32,
    }

    impl TaskParams for SceneParams {
        const TYPE: &'static str = "scene_gen";
    }

    struct SceneHandler;

    #[async_trait]
    impl Handler<SceneParams> for SceneHandler {
        async fn handle(
            &self,
            params: SceneParams,
            _ctx: CancellationToken,
            task: Task,
        ) -> Result<(), ExecutionError> {
            task.set_result(serde_json::json!({
                "title": format!("{}-{}", params.chapter, params.scene),
            }));
            Ok(())
        }
    }

    fn task_with(params: serde_json::Value) -> Task {
        let executor: Arc<dyn Executor> = Arc::new(TypedExecutor::new(SceneHandler));
        TaskBuilder::new(SceneParams::task_type(), "p", params, executor).build()
    }

    #[test]
    fn task_type_comes_from_const() {
        assert_eq!(SceneParams::task_type(), TaskType::SCENE_GEN);
    }

    #[tokio::test]
    async fn decodes_params_and_runs_handler() {
        let task = task_with(serde_json::json!({ "chapter": 2, "scene": 7 }));
        task.executor()
            .execute(task.context(), task.clone())
            .await
            .unwrap();
        assert_eq!(task.result().unwrap()["title"], "2-7");
    }

    #[tokio::test]
    async fn bad_params_are_reported_with_task_type() {
        let task = task_with(serde_json::json!({ "chapter": "two" }));
        let err = task
            .executor()
            .execute(task.context(), task.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidParams { ref task_type, .. } if task_type == "scene_gen"));
        assert!(task.result().is_none());
    }
}
