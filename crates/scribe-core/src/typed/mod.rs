//! Typed - 型付き executor API
//!
//! task_type の typo を型で排除し、params の decode を一箇所にまとめる。
//!
//! # 二層構造
//! - **表層（Typed）**: `TaskParams` trait, `Handler<P>` trait
//! - **内部（Dyn）**: `Executor` trait object（`TypedExecutor` が type erasure を担当）

pub mod handler;
pub mod params;
pub mod registry;

pub use self::handler::{Handler, TypedExecutor};
pub use self::params::TaskParams;
pub use self::registry::{ExecutorRegistry, RegistryError};
