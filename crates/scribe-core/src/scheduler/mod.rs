//! Scheduler - priority queue + fixed worker pool
//!
//! # 構成
//! - registry: `RwLock<HashMap<TaskId, Task>>`（唯一の真実）
//! - queue: `Mutex<PriorityQueue>`（Pending の並び順だけを持つ）
//! - workers: 固定長。各 worker は単一スロット
//! - dispatch loop: tick ごと + submit / worker の空きで早起き
//!
//! # 停止
//! `stop()` は root token を cancel してループの終了を待つ。
//! 実行中の executor には触れない（token は各 Task のもの）。

mod config;
mod stats;

pub use config::{ConfigError, ENV_DISPATCH_INTERVAL_MS, ENV_WORKER_COUNT, SchedulerConfig};
pub use stats::Stats;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use self::stats::StatsCounters;
use crate::domain::{TaskId, TaskStatus};
use crate::error::{ExecutionError, SchedulerError};
use crate::observability::SchedulerStatus;
use crate::ports::{Clock, SystemClock};
use crate::queue::PriorityQueue;
use crate::task::Task;
use crate::worker::{CompletionSink, Worker, WorkerOutcome, worker_loop};

pub type CompleteCallback = Arc<dyn Fn(&Task) + Send + Sync>;
pub type FailedCallback = Arc<dyn Fn(&Task, &ExecutionError) + Send + Sync>;

/// State shared between the public handle, the workers and the dispatch loop.
struct Shared {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    tasks: RwLock<HashMap<TaskId, Task>>,
    queue: Mutex<PriorityQueue>,
    workers: Vec<Arc<Worker>>,
    active: AtomicUsize,
    stats: StatsCounters,
    shutdown: CancellationToken,
    wake: Notify,
    on_complete: Option<CompleteCallback>,
    on_failed: Option<FailedCallback>,
}

impl Shared {
    fn queue(&self) -> MutexGuard<'_, PriorityQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tasks(&self) -> RwLockReadGuard<'_, HashMap<TaskId, Task>> {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn tasks_mut(&self) -> RwLockWriteGuard<'_, HashMap<TaskId, Task>> {
        self.tasks.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// One dispatch pass.
    ///
    /// Pops at most `idle` tasks. A task no worker accepts goes back to the
    /// front of its band and the pass ends.
    fn dispatch(&self) {
        let mut idle = self
            .workers
            .len()
            .saturating_sub(self.active.load(Ordering::Acquire));

        while idle > 0 {
            let Some(task) = self.queue().pop() else {
                break;
            };

            // cancel / pause 済み（Task のハンドル経由の場合はここで初めて数える）
            if task.status() != TaskStatus::Pending {
                debug!(task_id = %task.id(), status = %task.status(), "dropping non-pending task from queue");
                self.settle(&task);
                continue;
            }

            // token だけ直接 cancel されたケース
            if task.is_cancelled() {
                task.set_status(TaskStatus::Cancelled);
                if self.settle(&task).is_some() {
                    info!(task_id = %task.id(), "task cancelled before dispatch");
                }
                continue;
            }

            // 先に増やす: worker が即座に終わって減らしても下回らない
            self.active.fetch_add(1, Ordering::AcqRel);
            match self.workers.iter().find(|w| !w.is_busy() && w.try_submit(&task)) {
                Some(worker) => {
                    debug!(worker_id = worker.id(), task_id = %task.id(), task_type = %task.task_type(), "dispatched");
                    idle -= 1;
                }
                None => {
                    self.active.fetch_sub(1, Ordering::AcqRel);
                    self.queue().requeue(task);
                    break;
                }
            }
        }
    }

    /// Count `task` once it is terminal. Only the first caller per task counts.
    fn settle(&self, task: &Task) -> Option<TaskStatus> {
        let status = task.take_settlement()?;
        match status {
            TaskStatus::Completed => self.stats.record_completed(),
            TaskStatus::Failed => self.stats.record_failed(),
            TaskStatus::Cancelled | TaskStatus::Paused => self.stats.record_cancelled(),
            TaskStatus::Pending | TaskStatus::Running => {}
        }
        Some(status)
    }

    fn fire_complete(&self, task: &Task) {
        if let Some(cb) = &self.on_complete {
            if catch_unwind(AssertUnwindSafe(|| cb(task))).is_err() {
                warn!(task_id = %task.id(), "on_complete callback panicked");
            }
        }
    }

    fn fire_failed(&self, task: &Task, err: &ExecutionError) {
        if let Some(cb) = &self.on_failed {
            if catch_unwind(AssertUnwindSafe(|| cb(task, err))).is_err() {
                warn!(task_id = %task.id(), "on_failed callback panicked");
            }
        }
    }
}

impl CompletionSink for Shared {
    fn finished(&self, worker_id: usize, task: &Task, outcome: WorkerOutcome) {
        match outcome {
            WorkerOutcome::Completed => {
                if task.mark_completed() {
                    info!(worker_id, task_id = %task.id(), task_type = %task.task_type(), "task completed");
                    self.fire_complete(task);
                }
            }
            WorkerOutcome::Failed(err) => {
                if task.mark_failed(&err) {
                    warn!(worker_id, task_id = %task.id(), task_type = %task.task_type(), error = %err, "task failed");
                    self.fire_failed(task, &err);
                }
            }
            WorkerOutcome::Cancelled(err) => {
                // pause 済みなら Paused のまま
                if task.set_status(TaskStatus::Cancelled) {
                    info!(worker_id, task_id = %task.id(), reason = %err, "task cancelled");
                }
            }
            WorkerOutcome::Skipped => {}
            WorkerOutcome::Returned => {
                debug!(worker_id, task_id = %task.id(), "returning unstarted task to queue");
                self.queue().requeue(task.clone());
            }
        }

        // 実行中に Task ハンドルから pause された場合などもここで数える
        self.settle(task);

        self.active.fetch_sub(1, Ordering::AcqRel);
        self.wake.notify_one();
    }
}

async fn dispatch_loop(shared: Arc<Shared>) {
    let mut tick = time::interval(shared.config.dispatch_interval());
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shared.shutdown.cancelled() => break,
            _ = tick.tick() => {}
            _ = shared.wake.notified() => {}
        }
        shared.dispatch();
    }

    debug!("dispatch loop stopped");
}

/// Asynchronous task scheduler.
///
/// Construct one per composition root and share it as `Arc<Scheduler>`.
/// Dropping the last handle cancels the root token, so the background loops
/// exit even without an explicit [`Scheduler::stop`].
pub struct Scheduler {
    shared: Arc<Shared>,
    receivers: Mutex<Option<Vec<mpsc::Receiver<Task>>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::default()
    }

    fn from_builder(builder: SchedulerBuilder) -> Self {
        let config = sanitize(builder.config);
        let (workers, receivers): (Vec<_>, Vec<_>) = (0..config.worker_count)
            .map(|id| {
                let (worker, rx) = Worker::new(id);
                (Arc::new(worker), rx)
            })
            .unzip();

        Self {
            shared: Arc::new(Shared {
                config,
                clock: builder.clock,
                tasks: RwLock::new(HashMap::new()),
                queue: Mutex::new(PriorityQueue::new()),
                workers,
                active: AtomicUsize::new(0),
                stats: StatsCounters::default(),
                shutdown: CancellationToken::new(),
                wake: Notify::new(),
                on_complete: builder.on_complete,
                on_failed: builder.on_failed,
            }),
            receivers: Mutex::new(Some(receivers)),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Clock used for purge cutoffs. Tasks built for this scheduler should
    /// share it.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.shared.clock)
    }

    /// Spawn the workers and the dispatch loop on the current tokio runtime.
    pub fn start(&self) -> Result<(), SchedulerError> {
        if self.shared.shutdown.is_cancelled() {
            return Err(SchedulerError::Stopped);
        }
        let receivers = self
            .receivers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(SchedulerError::AlreadyStarted)?;

        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        for (worker, rx) in self.shared.workers.iter().zip(receivers) {
            handles.push(tokio::spawn(worker_loop(
                Arc::clone(worker),
                rx,
                self.shared.shutdown.clone(),
                Arc::clone(&self.shared) as Arc<dyn CompletionSink>,
            )));
        }
        handles.push(tokio::spawn(dispatch_loop(Arc::clone(&self.shared))));

        info!(
            worker_count = self.shared.workers.len(),
            dispatch_interval_ms = self.shared.config.dispatch_interval_ms,
            "scheduler started"
        );
        Ok(())
    }

    /// Cancel the root token and wait for every loop to exit.
    ///
    /// A worker in the middle of a task exits once its executor returns.
    /// Calling this more than once is a no-op.
    pub async fn stop(&self) {
        {
            // submit の insert と順序付けるため registry のロック下で cancel
            let _tasks = self.shared.tasks_mut();
            self.shared.shutdown.cancel();
        }
        let handles =
            std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        if handles.is_empty() {
            return;
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "scheduler loop ended abnormally");
            }
        }
        info!("scheduler stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    pub fn submit(&self, task: Task) -> Result<(), SchedulerError> {
        if self.shared.shutdown.is_cancelled() {
            return Err(SchedulerError::Stopped);
        }
        let status = task.status();
        if status != TaskStatus::Pending {
            return Err(SchedulerError::NotPending {
                id: task.id(),
                status,
            });
        }

        {
            let mut tasks = self.shared.tasks_mut();
            // stop() と競合した場合はロック下で再確認
            if self.shared.shutdown.is_cancelled() {
                return Err(SchedulerError::Stopped);
            }
            match tasks.entry(task.id()) {
                Entry::Occupied(_) => return Err(SchedulerError::DuplicateTask(task.id())),
                Entry::Vacant(slot) => {
                    slot.insert(task.clone());
                }
            }
            // registry から見える前に total を増やしておく
            self.shared.stats.record_submitted();
        }

        info!(
            task_id = %task.id(),
            task_type = %task.task_type(),
            project_id = task.project_id(),
            priority = %task.priority(),
            "task submitted"
        );
        self.shared.queue().push(task);
        self.shared.wake.notify_one();
        Ok(())
    }

    pub fn get_task(&self, id: TaskId) -> Option<Task> {
        self.shared.tasks().get(&id).cloned()
    }

    /// Cancel a pending or running task.
    ///
    /// Pending tasks become Cancelled immediately. Running tasks only get
    /// their token cancelled; the worker settles the status when the executor
    /// returns.
    pub fn cancel_task(&self, id: TaskId) -> Result<(), SchedulerError> {
        let task = self.get_task(id).ok_or(SchedulerError::TaskNotFound(id))?;
        task.cancel();
        if self.shared.settle(&task).is_some() {
            info!(task_id = %id, "task cancelled");
        } else {
            debug!(task_id = %id, status = %task.status(), "cancellation requested");
        }
        Ok(())
    }

    /// Mark a task Paused and cancel its token. Counted as cancelled.
    pub fn pause_task(&self, id: TaskId) -> Result<(), SchedulerError> {
        let task = self.get_task(id).ok_or(SchedulerError::TaskNotFound(id))?;
        task.pause();
        if self.shared.settle(&task).is_some() {
            info!(task_id = %id, "task paused");
        } else {
            debug!(task_id = %id, status = %task.status(), "pause ignored");
        }
        Ok(())
    }

    /// All tasks for `project_id`, oldest first.
    pub fn project_tasks(&self, project_id: &str) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .shared
            .tasks()
            .values()
            .filter(|t| t.project_id() == project_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| (t.created_at(), t.id()));
        tasks
    }

    pub fn stats(&self) -> Stats {
        self.shared.stats.snapshot()
    }

    /// Entries currently in the priority queue, including cancelled ones the
    /// dispatch loop has not dropped yet.
    pub fn queue_size(&self) -> usize {
        self.shared.queue().len()
    }

    pub fn active_workers(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    pub fn worker_count(&self) -> usize {
        self.shared.workers.len()
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            stats: self.stats(),
            active_workers: self.active_workers(),
            queued_tasks: self.queue_size(),
            worker_count: self.worker_count(),
        }
    }

    /// Remove terminal tasks whose `completed_at` is older than
    /// `now - older_than`. Returns how many were removed.
    pub fn clean_completed_tasks(&self, older_than: Duration) -> usize {
        let now = self.shared.clock.now();
        let cutoff = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|d| now.checked_sub_signed(d))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut tasks = self.shared.tasks_mut();
        let before = tasks.len();
        tasks.retain(|_, task| {
            !(task.is_terminal() && task.completed_at().is_some_and(|at| at < cutoff))
        });
        let removed = before - tasks.len();
        drop(tasks);

        if removed > 0 {
            info!(removed, %cutoff, "purged finished tasks");
        }
        removed
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

fn sanitize(mut config: SchedulerConfig) -> SchedulerConfig {
    if let Err(e) = config.validate() {
        warn!(error = %e, "invalid scheduler config, falling back to defaults for bad values");
        let defaults = SchedulerConfig::default();
        if config.worker_count == 0 {
            config.worker_count = defaults.worker_count;
        }
        if config.dispatch_interval_ms == 0 {
            config.dispatch_interval_ms = defaults.dispatch_interval_ms;
        }
    }
    config
}

/// Builder for a [`Scheduler`] with a custom clock or callbacks.
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    on_complete: Option<CompleteCallback>,
    on_failed: Option<FailedCallback>,
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self {
            config: SchedulerConfig::default(),
            clock: Arc::new(SystemClock),
            on_complete: None,
            on_failed: None,
        }
    }
}

impl SchedulerBuilder {
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Called once per task that reaches Completed.
    pub fn on_complete(mut self, f: impl Fn(&Task) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(f));
        self
    }

    /// Called once per task that reaches Failed.
    pub fn on_failed(mut self, f: impl Fn(&Task, &ExecutionError) + Send + Sync + 'static) -> Self {
        self.on_failed = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Scheduler {
        Scheduler::from_builder(self)
    }
}
