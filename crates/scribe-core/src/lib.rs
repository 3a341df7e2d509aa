//! scribe-core
//!
//! In-process asynchronous task scheduler for the novel-writing pipeline
//! (world building, planning, chapter/scene generation, export).
//!
//! # モジュール構成
//! - **domain**: 値型（TaskId, TaskType, TaskPriority, TaskStatus）
//! - **ports**: 抽象化レイヤー（Clock）
//! - **task**: Task ハンドル、TaskBuilder、Executor trait
//! - **queue**: 優先度付きキュー
//! - **worker**: 単一スロットの実行者
//! - **scheduler**: dispatch loop、registry、統計、設定
//! - **typed**: 型付き executor API（TaskParams, Handler, ExecutorRegistry）
//! - **app**: composition root（AppBuilder, App）
//! - **progress** / **observability**: 進捗報告とポーリング用ビュー

pub mod app;
pub mod domain;
pub mod error;
pub mod observability;
pub mod ports;
pub mod progress;
pub mod queue;
pub mod scheduler;
pub mod task;
pub mod typed;
mod worker;

pub use app::{App, AppBuilder, AppError, BuildError};
pub use domain::{TaskId, TaskPriority, TaskStatus, TaskType};
pub use error::{ExecutionError, SchedulerError};
pub use observability::{SchedulerStatus, TaskSnapshot};
pub use progress::ProgressTracker;
pub use scheduler::{Scheduler, SchedulerBuilder, SchedulerConfig, Stats};
pub use task::{Executor, Task, TaskBuilder, TimeoutExecutor, executor_fn};
pub use typed::{ExecutorRegistry, Handler, TaskParams};
