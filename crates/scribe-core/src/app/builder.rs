//! AppBuilder - 組み立てとワイヤリング
//!
//! - handler の登録と起動時検証（Fail-fast）
//! - Scheduler / ExecutorRegistry を一つの `App` にまとめる

use std::sync::Arc;

use tracing::info;

use crate::domain::{TaskId, TaskPriority, TaskType};
use crate::error::{ExecutionError, SchedulerError};
use crate::ports::{Clock, SystemClock};
use crate::scheduler::{ConfigError, Scheduler, SchedulerBuilder, SchedulerConfig};
use crate::task::{Executor, Task, TaskBuilder};
use crate::typed::{ExecutorRegistry, Handler, RegistryError, TaskParams};

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new()
///     .config(SchedulerConfig::load(None)?)
///     .register::<WorldParams, _>(WorldBuilder)?
///     .expect_tasks(&[TaskType::WORLD_BUILD])
///     .build()?;
/// app.start()?;
/// ```
///
/// # Fail-fast 設計
/// - `expect_tasks()` で期待される task_type を宣言
/// - `build()` 時に「期待集合 ⊆ 登録済み集合」をチェック
pub struct AppBuilder {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    registry: ExecutorRegistry,
    expected_tasks: Option<Vec<TaskType>>,
    scheduler: SchedulerBuilder,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing task types: {0:?}. These tasks were expected but not registered.")]
    MissingTaskTypes(Vec<TaskType>),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Registry(e) => e.code(),
            AppError::Scheduler(e) => e.code(),
        }
    }
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
            clock: Arc::new(SystemClock),
            registry: ExecutorRegistry::new(),
            expected_tasks: None,
            scheduler: Scheduler::builder(),
        }
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn register<P: TaskParams, H: Handler<P> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<P, H>(handler)?;
        Ok(self)
    }

    pub fn register_executor(
        mut self,
        task_type: TaskType,
        executor: Arc<dyn Executor>,
    ) -> Result<Self, RegistryError> {
        self.registry.register_executor(task_type, executor)?;
        Ok(self)
    }

    pub fn expect_tasks(mut self, task_types: &[TaskType]) -> Self {
        self.expected_tasks = Some(task_types.to_vec());
        self
    }

    pub fn on_complete(mut self, f: impl Fn(&Task) + Send + Sync + 'static) -> Self {
        self.scheduler = self.scheduler.on_complete(f);
        self
    }

    pub fn on_failed(mut self, f: impl Fn(&Task, &ExecutionError) + Send + Sync + 'static) -> Self {
        self.scheduler = self.scheduler.on_failed(f);
        self
    }

    /// # 検証
    /// - config が妥当か
    /// - `expect_tasks()` の task_type が全て登録されているか
    pub fn build(self) -> Result<App, BuildError> {
        self.config.validate()?;

        if let Some(expected_tasks) = &self.expected_tasks {
            let missing_tasks: Vec<TaskType> = expected_tasks
                .iter()
                .filter(|t| !self.registry.contains(t))
                .cloned()
                .collect();
            if !missing_tasks.is_empty() {
                return Err(BuildError::MissingTaskTypes(missing_tasks));
            }
        }

        let scheduler = self.scheduler.config(self.config).clock(self.clock).build();
        Ok(App {
            scheduler: Arc::new(scheduler),
            registry: Arc::new(self.registry),
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Scheduler + registry.
#[derive(Clone)]
pub struct App {
    scheduler: Arc<Scheduler>,
    registry: Arc<ExecutorRegistry>,
}

impl App {
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn registry(&self) -> &Arc<ExecutorRegistry> {
        &self.registry
    }

    pub fn start(&self) -> Result<(), AppError> {
        self.scheduler.start()?;
        info!(task_types = ?self.registry.registered_types(), "app started");
        Ok(())
    }

    pub async fn stop(&self) {
        self.scheduler.stop().await;
    }

    /// Build a task of `P::TYPE` and submit it.
    pub fn submit<P: TaskParams>(
        &self,
        project_id: impl Into<String>,
        params: &P,
        priority: TaskPriority,
    ) -> Result<Task, AppError> {
        let builder = self.registry.typed_task(project_id, params)?;
        self.submit_builder(builder, priority)
    }

    /// Same as [`App::submit`] for raw JSON params.
    pub fn submit_raw(
        &self,
        task_type: TaskType,
        project_id: impl Into<String>,
        params: serde_json::Value,
        priority: TaskPriority,
    ) -> Result<Task, AppError> {
        let builder = self.registry.task(task_type, project_id, params)?;
        self.submit_builder(builder, priority)
    }

    fn submit_builder(&self, builder: TaskBuilder, priority: TaskPriority) -> Result<Task, AppError> {
        let task = builder
            .priority(priority)
            .clock(self.scheduler.clock())
            .scheduler(&self.scheduler)
            .submit()?;
        Ok(task)
    }

    pub fn task(&self, id: TaskId) -> Result<Task, AppError> {
        self.scheduler
            .get_task(id)
            .ok_or(AppError::Scheduler(SchedulerError::TaskNotFound(id)))
    }
}
