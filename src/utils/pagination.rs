use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

/// limit/offset 分页参数 (已规范化)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOffset {
    pub limit: u64,
    pub offset: u64,
}

impl LimitOffset {
    /// limit 默认 10, 限制在 1..=100; offset 默认 0
    pub fn new(limit: Option<u64>, offset: Option<u64>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

impl Default for LimitOffset {
    fn default() -> Self {
        Self::new(None, None)
    }
}
