use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::entities::{OutcomeStatus, draw_history_entity as history, pool_item_entity as items};
use crate::utils::LimitOffset;

pub const UNKNOWN_ITEM_NAME: &str = "Unknown Item";
pub const DEFAULT_ITEM_IMAGE: &str = "default_image.png";

/// 抽奖历史查询参数
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// 不传则返回全站最近记录
    pub customer_id: Option<i64>,
    /// 条数 (默认 10, 最大 100)
    pub limit: Option<u64>,
    /// 偏移 (默认 0)
    pub offset: Option<u64>,
}

impl HistoryQuery {
    pub fn page(&self) -> LimitOffset {
        LimitOffset::new(self.limit, self.offset)
    }
}

/// 抽奖历史记录 (物品信息读取时关联)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntryResponse {
    pub id: i64,
    pub draw_id: Uuid,
    pub user_id: i64,
    pub pool_id: String,
    pub item_id: Option<i64>,
    pub item_name: String,
    pub item_image: String,
    pub amount_debited: i64,
    pub outcome_status: OutcomeStatus,
    pub failure_kind: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntryResponse {
    pub fn from_parts(record: history::Model, item: Option<&items::Model>) -> Self {
        let (item_name, item_image) = match item {
            Some(item) => (item.name.clone(), item.image_url.clone()),
            None => (UNKNOWN_ITEM_NAME.to_string(), DEFAULT_ITEM_IMAGE.to_string()),
        };
        HistoryEntryResponse {
            id: record.id,
            draw_id: record.draw_id,
            user_id: record.user_id,
            pool_id: record.pool_id,
            item_id: record.item_id,
            item_name,
            item_image,
            amount_debited: record.amount_debited,
            outcome_status: record.outcome_status,
            failure_kind: record.failure_kind,
            created_at: record.created_at,
        }
    }
}

/// 抽奖历史分页
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryPageResponse {
    pub items: Vec<HistoryEntryResponse>,
    pub limit: u64,
    pub offset: u64,
}
