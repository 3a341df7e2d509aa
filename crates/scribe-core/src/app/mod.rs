//! App - アプリケーション層
//!
//! Scheduler と ExecutorRegistry を組み合わせる composition root。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: 構築とワイヤリング、起動時検証
//! - **App**: 型付き submit と lifecycle

pub mod builder;

pub use self::builder::{App, AppBuilder, AppError, BuildError};
