use serde::{Deserialize, Serialize};
use std::fmt;

/// Task priority. Higher values are dispatched first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low = 1,
    #[default]
    Normal = 5,
    High = 10,
}

impl TaskPriority {
    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(TaskPriority::Low),
            5 => Some(TaskPriority::Normal),
            10 => Some(TaskPriority::High),
            _ => None,
        }
    }
}

/// Numeric form (`1` / `5` / `10`) for `#[serde(with = ...)]`.
///
/// 外部向け JSON（TaskSnapshot）はこちらを使う。
pub mod as_value {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TaskPriority;

    pub fn serialize<S: Serializer>(priority: &TaskPriority, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(priority.value())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<TaskPriority, D::Error> {
        let value = u8::deserialize(d)?;
        TaskPriority::from_value(value)
            .ok_or_else(|| D::Error::custom(format!("unknown priority value: {value}")))
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskPriority::Low => "low",
            TaskPriority::Normal => "normal",
            TaskPriority::High => "high",
        };
        f.write_str(s)
    }
}
