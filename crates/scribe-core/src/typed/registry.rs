//! ExecutorRegistry - task_type → Executor
//!
//! 初期化時に組み立て（&mut）、実行時は `Arc` で共有して読むだけ。ロック不要。

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{Handler, TypedExecutor};
use super::params::TaskParams;
use crate::domain::TaskType;
use crate::task::{Executor, TaskBuilder};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("executor for task type '{0}' is already registered")]
    AlreadyRegistered(TaskType),

    #[error("no executor registered for task type '{0}'")]
    HandlerNotFound(TaskType),

    #[error("failed to encode params for task type '{task_type}': {source}")]
    Encode {
        task_type: TaskType,
        #[source]
        source: serde_json::Error,
    },
}

impl RegistryError {
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::AlreadyRegistered(_) => "HANDLER_EXISTS",
            RegistryError::HandlerNotFound(_) => "HANDLER_NOT_FOUND",
            RegistryError::Encode { .. } => "INVALID_PARAMS",
        }
    }
}

/// Executors keyed by task type.
///
/// ```ignore
/// let mut registry = ExecutorRegistry::new();
/// registry.register::<ChapterParams, _>(ChapterWriter::new(llm))?;
///
/// let task = registry
///     .typed_task("novel-1", &ChapterParams { chapter: 3, .. })?
///     .priority(TaskPriority::High)
///     .build();
/// ```
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<TaskType, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed handler under `P::TYPE`.
    pub fn register<P: TaskParams, H: Handler<P> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        self.register_executor(P::task_type(), Arc::new(TypedExecutor::<P, H>::new(handler)))
    }

    /// Register an untyped executor (e.g. a closure via `executor_fn`).
    pub fn register_executor(
        &mut self,
        task_type: TaskType,
        executor: Arc<dyn Executor>,
    ) -> Result<(), RegistryError> {
        if self.executors.contains_key(&task_type) {
            return Err(RegistryError::AlreadyRegistered(task_type));
        }
        self.executors.insert(task_type, executor);
        Ok(())
    }

    pub fn get(&self, task_type: &TaskType) -> Option<Arc<dyn Executor>> {
        self.executors.get(task_type).cloned()
    }

    pub fn contains(&self, task_type: &TaskType) -> bool {
        self.executors.contains_key(task_type)
    }

    /// Registered types, sorted.
    pub fn registered_types(&self) -> Vec<TaskType> {
        let mut types: Vec<TaskType> = self.executors.keys().cloned().collect();
        types.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        types
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }

    /// Builder for a task of `task_type` with raw JSON params.
    pub fn task(
        &self,
        task_type: TaskType,
        project_id: impl Into<String>,
        params: serde_json::Value,
    ) -> Result<TaskBuilder, RegistryError> {
        let executor = self
            .get(&task_type)
            .ok_or_else(|| RegistryError::HandlerNotFound(task_type.clone()))?;
        Ok(TaskBuilder::new(task_type, project_id, params, executor))
    }

    /// Builder for a task of `P::TYPE`, encoding `params` to JSON.
    pub fn typed_task<P: TaskParams>(
        &self,
        project_id: impl Into<String>,
        params: &P,
    ) -> Result<TaskBuilder, RegistryError> {
        let value = serde_json::to_value(params).map_err(|source| RegistryError::Encode {
            task_type: P::task_type(),
            source,
        })?;
        self.task(P::task_type(), project_id, value)
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("types", &self.registered_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutionError;
    use crate::task::{Task, executor_fn};
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use tokio_util::sync::CancellationToken;

    #[derive(Debug, Serialize, Deserialize)]
    struct WorldParams {
        genre: String,
    }

    impl TaskParams for WorldParams {
        const TYPE: &'static str = "world_build";
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct ExportParams {
        format: String,
    }

    impl TaskParams for ExportParams {
        const TYPE: &'static str = "export";
    }

    struct WorldHandler;

    #[async_trait]
    impl Handler<WorldParams> for WorldHandler {
        async fn handle(
            &self,
            params: WorldParams,
            _ctx: CancellationToken,
            task: Task,
        ) -> Result<(), ExecutionError> {
            task.set_result(serde_json::json!({ "genre": params.genre }));
            Ok(())
        }
    }

    #[test]
    fn register_and_get() {
        let mut registry = ExecutorRegistry::new();
        registry.register::<WorldParams, _>(WorldHandler).unwrap();

        assert!(registry.get(&TaskType::WORLD_BUILD).is_some());
        assert!(registry.get(&TaskType::EXPORT).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn double_registration_is_rejected() {
        let mut registry = ExecutorRegistry::new();
        registry.register::<WorldParams, _>(WorldHandler).unwrap();
        let err = registry
            .register_executor(TaskType::WORLD_BUILD, executor_fn(|_, _| async { Ok(()) }))
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered(t) if t == TaskType::WORLD_BUILD));
    }

    #[test]
    fn registered_types_are_sorted() {
        let mut registry = ExecutorRegistry::new();
        registry
            .register_executor(TaskType::EXPORT, executor_fn(|_, _| async { Ok(()) }))
            .unwrap();
        registry.register::<WorldParams, _>(WorldHandler).unwrap();
        assert_eq!(
            registry.registered_types(),
            vec![TaskType::EXPORT, TaskType::WORLD_BUILD]
        );
    }

    #[test]
    fn task_for_unknown_type_fails() {
        let registry = ExecutorRegistry::new();
        let err = registry
            .typed_task("p", &ExportParams { format: "epub".into() })
            .unwrap_err();
        assert_eq!(err.code(), "HANDLER_NOT_FOUND");
    }

    #[tokio::test]
    async fn typed_task_round_trips_through_handler() {
        let mut registry = ExecutorRegistry::new();
        registry.register::<WorldParams, _>(WorldHandler).unwrap();

        let task = registry
            .typed_task("novel-1", &WorldParams { genre: "space opera".into() })
            .unwrap()
            .build();
        assert_eq!(task.task_type(), &TaskType::WORLD_BUILD);
        assert_eq!(task.params()["genre"], "space opera");

        task.executor()
            .execute(task.context(), task.clone())
            .await
            .unwrap();
        assert_eq!(task.result().unwrap()["genre"], "space opera");
    }
}
