//! Domain model (ids, task types, priorities, status).
//!
//! スケジューラに依存しない値型だけを置く。

pub mod ids;
pub mod priority;
pub mod state;
pub mod task_type;

pub use ids::{ParseTaskIdError, TaskId};
pub use priority::TaskPriority;
pub use state::TaskStatus;
pub use task_type::TaskType;
