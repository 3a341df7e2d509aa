//! Queue module: ordering of pending tasks.
//!
//! Design intent:
//! - The queue only orders; it never changes task state.
//! - The scheduler's registry stays the single source of truth for tasks.
//! - Entries hold `Task` handles, not copies.

mod memory;

pub use memory::PriorityQueue;
