//! TaskType - タスクの種類タグ
//!
//! 任意の文字列を受け付ける open な tag。よく使う種類は定数で提供する。

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskType(Cow<'static, str>);

impl TaskType {
    /// 世界構築
    pub const WORLD_BUILD: TaskType = TaskType::from_static("world_build");
    /// 叙事プラン
    pub const NARRATIVE_PLAN: TaskType = TaskType::from_static("narrative_plan");
    /// 章の生成
    pub const CHAPTER_GEN: TaskType = TaskType::from_static("chapter_gen");
    /// シーンの生成
    pub const SCENE_GEN: TaskType = TaskType::from_static("scene_gen");
    /// エクスポート
    pub const EXPORT: TaskType = TaskType::from_static("export");

    pub fn new(s: impl Into<String>) -> Self {
        Self(Cow::Owned(s.into()))
    }

    pub const fn from_static(s: &'static str) -> Self {
        Self(Cow::Borrowed(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for TaskType {
    fn from(s: &'static str) -> Self {
        Self::from_static(s)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_and_static_compare_equal() {
        assert_eq!(TaskType::new("chapter_gen"), TaskType::CHAPTER_GEN);
    }

    #[test]
    fn serializes_as_plain_string() {
        let s = serde_json::to_string(&TaskType::WORLD_BUILD).unwrap();
        assert_eq!(s, "\"world_build\"");

        let back: TaskType = serde_json::from_str("\"export\"").unwrap();
        assert_eq!(back, TaskType::EXPORT);
    }
}
