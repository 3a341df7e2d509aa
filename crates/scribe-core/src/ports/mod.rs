//! Ports - 外部依存の抽象化
//!
//! 今のところ時刻だけ。タスクのタイムスタンプと `clean_completed_tasks` の
//! 基準時刻はすべて `Clock` 経由で取得する。

pub mod clock;

pub use self::clock::{Clock, FixedClock, SystemClock};
