//! TaskParams - params の型と task_type の対応付け

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::TaskType;

/// Ties a params struct to the task type it drives.
///
/// # 使用例
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct ChapterParams {
///     chapter: u32,
///     outline: String,
/// }
///
/// impl TaskParams for ChapterParams {
///     const TYPE: &'static str = "chapter_gen";
/// }
/// ```
///
/// `TYPE` は `TaskType` の定数（`world_build` など）と同じ文字列を使う
pub trait TaskParams: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE: &'static str;

    fn task_type() -> TaskType {
        TaskType::from_static(Self::TYPE)
    }
}
