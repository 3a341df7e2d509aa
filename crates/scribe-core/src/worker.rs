//! Worker - 一度に一つだけタスクを実行するスロット
//!
//! - `try_submit` は non-blocking: スロットが空いていなければ即 false
//! - ループは「シャットダウン」か「タスク受け取り」を select で待つ
//! - executor は別の tokio task で動かし、panic は JoinError として回収する

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::TaskStatus;
use crate::error::ExecutionError;
use crate::task::Task;

/// How a handed-off task ended, as seen by the worker.
#[derive(Debug)]
pub(crate) enum WorkerOutcome {
    /// Executor returned `Ok`.
    Completed,
    /// Executor returned an error (or panicked) with the token unset.
    Failed(ExecutionError),
    /// Executor returned an error after the token was cancelled.
    Cancelled(ExecutionError),
    /// Task was no longer Pending when the worker picked it up.
    Skipped,
    /// Handed off but never started because the scheduler shut down.
    Returned,
}

/// Receives every task a worker is done with.
///
/// The scheduler implements this to correct the active-worker count, update
/// stats and fire callbacks.
pub(crate) trait CompletionSink: Send + Sync {
    fn finished(&self, worker_id: usize, task: &Task, outcome: WorkerOutcome);
}

/// One execution slot.
#[derive(Debug)]
pub struct Worker {
    id: usize,
    slot: mpsc::Sender<Task>,
    busy: AtomicBool,
}

impl Worker {
    pub(crate) fn new(id: usize) -> (Self, mpsc::Receiver<Task>) {
        let (slot, rx) = mpsc::channel(1);
        let worker = Self {
            id,
            slot,
            busy: AtomicBool::new(false),
        };
        (worker, rx)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Hand `task` to this worker if its slot is free. Never waits.
    pub fn try_submit(&self, task: &Task) -> bool {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        match self.slot.try_send(task.clone()) {
            Ok(()) => true,
            Err(_) => {
                // ループが終了済み（チャネルが閉じている）
                self.busy.store(false, Ordering::Release);
                false
            }
        }
    }

    fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }
}

pub(crate) async fn worker_loop(
    worker: Arc<Worker>,
    mut rx: mpsc::Receiver<Task>,
    shutdown: CancellationToken,
    sink: Arc<dyn CompletionSink>,
) {
    let worker_id = worker.id();
    info!(worker_id, "worker started");

    loop {
        let task = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            task = rx.recv() => match task {
                Some(task) => task,
                None => break,
            },
        };

        let outcome = execute(worker_id, &task).await;
        worker.release();
        sink.finished(worker_id, &task, outcome);
    }

    // 受け取ったまま開始していないタスクは queue に戻す
    rx.close();
    while let Ok(task) = rx.try_recv() {
        worker.release();
        sink.finished(worker_id, &task, WorkerOutcome::Returned);
    }

    info!(worker_id, "worker stopped");
}

async fn execute(worker_id: usize, task: &Task) -> WorkerOutcome {
    if !task.set_status(TaskStatus::Running) {
        debug!(worker_id, task_id = %task.id(), status = %task.status(), "task no longer pending, skipping");
        return WorkerOutcome::Skipped;
    }
    info!(worker_id, %task, "executing");

    let executor = task.executor();
    let ctx = task.context();
    let handle = task.clone();
    let joined = tokio::spawn(async move { executor.execute(ctx, handle).await }).await;

    match joined {
        Ok(Ok(())) => WorkerOutcome::Completed,
        Ok(Err(err)) if task.is_cancelled() => WorkerOutcome::Cancelled(err),
        Ok(Err(err)) => WorkerOutcome::Failed(err),
        Err(join_err) if join_err.is_panic() => WorkerOutcome::Failed(ExecutionError::Panicked(
            panic_message(join_err.into_panic()),
        )),
        Err(join_err) => WorkerOutcome::Failed(ExecutionError::failed(join_err)),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
