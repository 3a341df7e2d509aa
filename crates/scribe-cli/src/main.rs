use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scribe_core::{
    AppBuilder, ExecutionError, Handler, ProgressTracker, SchedulerConfig, Task, TaskParams,
    TaskPriority, TaskType, TimeoutExecutor, executor_fn,
};

const PROJECT: &str = "novel-demo";

#[derive(Debug, Serialize, Deserialize)]
struct WorldParams {
    genre: String,
    regions: u32,
}

impl TaskParams for WorldParams {
    const TYPE: &'static str = "world_build";
}

#[derive(Debug, Serialize, Deserialize)]
struct ChapterParams {
    chapter: u32,
    scenes: usize,
}

impl TaskParams for ChapterParams {
    const TYPE: &'static str = "chapter_gen";
}

#[derive(Debug, Serialize, Deserialize)]
struct ExportParams {
    format: String,
}

impl TaskParams for ExportParams {
    const TYPE: &'static str = "export";
}

struct WorldBuilder;

#[async_trait]
impl Handler<WorldParams> for WorldBuilder {
    async fn handle(
        &self,
        params: WorldParams,
        _ctx: CancellationToken,
        task: Task,
    ) -> Result<(), ExecutionError> {
        sleep(Duration::from_millis(50)).await;
        task.set_result(serde_json::json!({
            "genre": params.genre,
            "regions": (1..=params.regions).map(|i| format!("region-{i}")).collect::<Vec<_>>(),
        }));
        Ok(())
    }
}

/// シーン単位で進捗を報告する
struct ChapterWriter;

#[async_trait]
impl Handler<ChapterParams> for ChapterWriter {
    async fn handle(
        &self,
        params: ChapterParams,
        ctx: CancellationToken,
        task: Task,
    ) -> Result<(), ExecutionError> {
        let mut tracker = ProgressTracker::new(&task, params.scenes);
        for _ in 0..params.scenes {
            tokio::select! {
                _ = ctx.cancelled() => return Err(ExecutionError::Cancelled),
                _ = sleep(Duration::from_millis(40)) => tracker.increment(),
            }
        }
        tracker.complete();
        task.set_result(serde_json::json!({
            "chapter": params.chapter,
            "words": params.scenes * 1200,
        }));
        Ok(())
    }
}

struct Exporter;

#[async_trait]
impl Handler<ExportParams> for Exporter {
    async fn handle(
        &self,
        params: ExportParams,
        _ctx: CancellationToken,
        _task: Task,
    ) -> Result<(), ExecutionError> {
        Err(ExecutionError::failed(format!(
            "unsupported export format: {}",
            params.format
        )))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // (A) 設定: 引数に TOML があれば読む + SCRIBE_* で上書き
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = SchedulerConfig::load(config_path.as_deref())?;

    // plan は 100ms で打ち切る（TimeoutExecutor → Cancelled）
    let slow_plan = executor_fn(|ctx: CancellationToken, _task: Task| async move {
        ctx.cancelled().await;
        Err(ExecutionError::Cancelled)
    });

    // (B) App を組み立てる
    let app = AppBuilder::new()
        .config(config)
        .register::<WorldParams, _>(WorldBuilder)?
        .register::<ChapterParams, _>(ChapterWriter)?
        .register::<ExportParams, _>(Exporter)?
        .register_executor(
            TaskType::NARRATIVE_PLAN,
            Arc::new(TimeoutExecutor::new(slow_plan, Duration::from_millis(100))),
        )?
        .expect_tasks(&[
            TaskType::WORLD_BUILD,
            TaskType::NARRATIVE_PLAN,
            TaskType::CHAPTER_GEN,
            TaskType::EXPORT,
        ])
        .on_complete(|task| info!(task = %task, "on_complete"))
        .on_failed(|task, err| warn!(task = %task, error = %err, "on_failed"))
        .build()?;
    app.start()?;

    // (C) タスク投入
    app.submit(
        PROJECT,
        &WorldParams {
            genre: "fantasy".to_string(),
            regions: 3,
        },
        TaskPriority::High,
    )?;
    app.submit_raw(
        TaskType::NARRATIVE_PLAN,
        PROJECT,
        serde_json::json!({ "acts": 3 }),
        TaskPriority::High,
    )?;
    let mut chapters = Vec::new();
    for chapter in 1..=4 {
        chapters.push(app.submit(
            PROJECT,
            &ChapterParams { chapter, scenes: 5 },
            TaskPriority::Normal,
        )?);
    }
    app.submit(
        PROJECT,
        &ExportParams {
            format: "pdf".to_string(),
        },
        TaskPriority::Low,
    )?;

    // 最後の章はやめる
    if let Some(last) = chapters.last() {
        app.scheduler().cancel_task(last.id())?;
    }

    // (D) 全部終わるまでポーリング
    let scheduler = app.scheduler();
    loop {
        let tasks = scheduler.project_tasks(PROJECT);
        if tasks.iter().all(Task::is_terminal) {
            break;
        }
        for task in tasks.iter().filter(|t| !t.is_terminal()) {
            info!(task = %task, "waiting");
        }
        sleep(Duration::from_millis(100)).await;
    }

    for task in scheduler.project_tasks(PROJECT) {
        println!("{}", serde_json::to_string_pretty(&task.snapshot())?);
    }
    println!("{}", serde_json::to_string_pretty(&scheduler.status())?);

    // (E) 後片付け
    sleep(Duration::from_millis(10)).await;
    let purged = scheduler.clean_completed_tasks(Duration::ZERO);
    info!(purged, "finished tasks purged");

    app.stop().await;
    Ok(())
}
