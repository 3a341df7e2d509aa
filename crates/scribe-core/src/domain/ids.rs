//! Task identifiers.
//!
//! # ULID ベースの ID
//! `TaskId` は ULID (Universally Unique Lexicographically Sortable Identifier) を包む newtype です。
//!
//! - **時刻でソート可能**: timestamp が先頭にあるため、生成順序でソートできる
//! - **調整なしで生成可能**: 呼び出し側が自由に Task を組み立てられる
//! - **表示形式**: `task-<ULID>`（HTTP のパスなどから `FromStr` で戻せる）

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

const PREFIX: &str = "task-";

/// Identifier of a Task (the unit of submit / status / cancel).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(Ulid);

impl TaskId {
    /// 新しい ID を生成
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }

    /// First 8 characters of the ULID, used in log lines.
    pub fn short(&self) -> String {
        self.0.to_string().chars().take(8).collect()
    }
}

impl From<Ulid> for TaskId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", PREFIX, self.0)
    }
}

/// Error returned when a string is neither `task-<ULID>` nor a bare ULID.
#[derive(Debug, thiserror::Error)]
#[error("invalid task id '{input}': {source}")]
pub struct ParseTaskIdError {
    input: String,
    #[source]
    source: ulid::DecodeError,
}

impl FromStr for TaskId {
    type Err = ParseTaskIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(PREFIX).unwrap_or(s);
        Ulid::from_string(raw)
            .map(Self)
            .map_err(|source| ParseTaskIdError {
                input: s.to_string(),
                source,
            })
    }
}
