use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 错误响应体中的 `error` 字段
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}
