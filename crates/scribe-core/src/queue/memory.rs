//! In-memory priority queue.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};

use crate::domain::TaskPriority;
use crate::task::Task;

/// Heap entry.
///
/// Priority and creation time are captured at push time so the ordering
/// never changes while the entry sits inside the heap. `seq` breaks ties
/// between tasks created within the same clock tick.
#[derive(Debug)]
struct QueuedTask {
    priority: TaskPriority,
    created_at: DateTime<Utc>,
    seq: i64,
    task: Task,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap は max-heap: 優先度が高いものが先、
        // 同じ優先度なら作成時刻（→ 投入順）が早いものが先
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.created_at.cmp(&self.created_at))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Pending tasks ordered by priority, then FIFO.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    heap: BinaryHeap<QueuedTask>,
    /// 通常の push は増加方向
    next_seq: i64,
    /// requeue は減少方向（同じキーの中で先頭に戻す）
    front_seq: i64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: Task) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.insert(task, seq);
    }

    /// Put back a task that was just popped but could not be placed.
    ///
    /// It sorts ahead of every entry with the same priority and creation
    /// time, which is where it was before the pop.
    pub fn requeue(&mut self, task: Task) {
        self.front_seq -= 1;
        let seq = self.front_seq;
        self.insert(task, seq);
    }

    fn insert(&mut self, task: Task, seq: i64) {
        self.heap.push(QueuedTask {
            priority: task.priority(),
            created_at: task.created_at(),
            seq,
            task,
        });
    }

    /// Remove and return the highest-priority task.
    pub fn pop(&mut self) -> Option<Task> {
        self.heap.pop().map(|entry| entry.task)
    }

    pub fn peek(&self) -> Option<&Task> {
        self.heap.peek().map(|entry| &entry.task)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
