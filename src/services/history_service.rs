use crate::entities::{OutcomeStatus, draw_history_entity as history, pool_item_entity as items};
use crate::error::AppResult;
use crate::models::{HistoryEntryResponse, HistoryPageResponse, HistoryQuery};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::collections::HashMap;
use uuid::Uuid;

/// 一条待写入的抽奖历史
#[derive(Debug, Clone)]
pub struct NewHistoryRecord {
    pub draw_id: Uuid,
    pub user_id: i64,
    pub item_id: Option<i64>,
    pub amount_debited: i64,
    pub pool_id: String,
    pub client_ip: Option<String>,
    pub outcome_status: OutcomeStatus,
    pub failure_kind: Option<String>,
    pub error_detail: Option<String>,
}

/// 抽奖历史 (只追加)
#[derive(Clone)]
pub struct HistoryService {
    pool: DatabaseConnection,
}

impl HistoryService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn append_on<C: ConnectionTrait>(
        conn: &C,
        record: NewHistoryRecord,
    ) -> AppResult<history::Model> {
        let model = history::ActiveModel {
            draw_id: Set(record.draw_id),
            user_id: Set(record.user_id),
            item_id: Set(record.item_id),
            amount_debited: Set(record.amount_debited),
            pool_id: Set(record.pool_id),
            client_ip: Set(record.client_ip),
            outcome_status: Set(record.outcome_status),
            failure_kind: Set(record.failure_kind),
            error_detail: Set(record.error_detail),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(conn)
        .await?;
        Ok(model)
    }

    /// 最新在前; 物品名称/图片按 item_id 读取时关联
    pub async fn list(&self, query: &HistoryQuery) -> AppResult<HistoryPageResponse> {
        let page = query.page();
        let mut select = history::Entity::find();
        if let Some(user_id) = query.customer_id {
            select = select.filter(history::Column::UserId.eq(user_id));
        }
        let records = select
            .order_by_desc(history::Column::CreatedAt)
            .order_by_desc(history::Column::Id)
            .limit(page.limit)
            .offset(page.offset)
            .all(&self.pool)
            .await?;

        let mut item_ids: Vec<i64> = records.iter().filter_map(|r| r.item_id).collect();
        item_ids.sort_unstable();
        item_ids.dedup();
        let catalog: HashMap<i64, items::Model> = if item_ids.is_empty() {
            HashMap::new()
        } else {
            items::Entity::find()
                .filter(items::Column::Id.is_in(item_ids))
                .all(&self.pool)
                .await?
                .into_iter()
                .map(|m| (m.id, m))
                .collect()
        };

        let entries = records
            .into_iter()
            .map(|record| {
                let item = record.item_id.and_then(|id| catalog.get(&id));
                HistoryEntryResponse::from_parts(record, item)
            })
            .collect();

        Ok(HistoryPageResponse {
            items: entries,
            limit: page.limit,
            offset: page.offset,
        })
    }
}
