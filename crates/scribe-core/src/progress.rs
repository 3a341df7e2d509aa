//! ProgressTracker - 「n 件中 m 件」を Task の progress (%) に変換する

use chrono::{DateTime, Utc};

use crate::task::Task;

/// Counts units of work and mirrors them onto the task's progress.
///
/// ```ignore
/// let mut tracker = ProgressTracker::new(&task, scenes.len());
/// for scene in scenes {
///     render(scene).await?;
///     tracker.increment();
/// }
/// tracker.complete();
/// ```
#[derive(Debug)]
pub struct ProgressTracker {
    task: Task,
    total: usize,
    current: usize,
    last_update: DateTime<Utc>,
}

impl ProgressTracker {
    pub fn new(task: &Task, total: usize) -> Self {
        Self {
            task: task.clone(),
            total,
            current: 0,
            last_update: task.now(),
        }
    }

    pub fn increment(&mut self) {
        self.add(1);
    }

    pub fn add(&mut self, n: usize) {
        self.current = self.current.saturating_add(n);
        self.update();
    }

    pub fn set(&mut self, current: usize) {
        self.current = current;
        self.update();
    }

    /// Jump to 100% regardless of the count.
    pub fn complete(&mut self) {
        self.current = self.total;
        self.task.set_progress(100.0);
        self.last_update = self.task.now();
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    fn update(&mut self) {
        // total == 0 のときは progress を触らない
        if self.total > 0 {
            self.task
                .set_progress(self.current as f64 / self.total as f64 * 100.0);
        }
        self.last_update = self.task.now();
    }
}
