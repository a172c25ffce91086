use crate::entities::{InventoryStatus, inventory_entry_entity as inventory, pool_item_entity as items};
use crate::error::AppResult;
use crate::models::InventoryItemResponse;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict, Query};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use std::collections::HashMap;

#[derive(Clone)]
pub struct InventoryService {
    pool: DatabaseConnection,
}

impl InventoryService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 中奖入库: 不存在则创建 quantity = 1 (状态 owned), 否则 quantity + 1.
    ///
    /// 已有记录的状态保持不变, 不会重置为 owned: 处于 pending_delivery 的
    /// 记录在履约完成前始终保持 pending_delivery.
    pub async fn grant_on<C: ConnectionTrait>(conn: &C, user_id: i64, item_id: i64) -> AppResult<()> {
        let now = Utc::now();
        let upsert = Query::insert()
            .into_table(inventory::Entity)
            .columns([
                inventory::Column::UserId,
                inventory::Column::ItemId,
                inventory::Column::Quantity,
                inventory::Column::Status,
                inventory::Column::CreatedAt,
                inventory::Column::UpdatedAt,
            ])
            .values_panic([
                user_id.into(),
                item_id.into(),
                1i64.into(),
                InventoryStatus::Owned.to_string().into(),
                now.into(),
                now.into(),
            ])
            .on_conflict(
                OnConflict::columns([inventory::Column::UserId, inventory::Column::ItemId])
                    .value(
                        inventory::Column::Quantity,
                        Expr::col((inventory::Entity, inventory::Column::Quantity)).add(1),
                    )
                    .value(inventory::Column::UpdatedAt, now)
                    .to_owned(),
            )
            .to_owned();
        let backend = conn.get_database_backend();
        conn.execute(backend.build(&upsert)).await?;
        Ok(())
    }

    pub async fn mark_status_on<C: ConnectionTrait>(
        conn: &C,
        user_id: i64,
        item_id: i64,
        status: InventoryStatus,
    ) -> AppResult<u64> {
        let result = inventory::Entity::update_many()
            .col_expr(inventory::Column::Status, Expr::value(status.to_string()))
            .col_expr(inventory::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(inventory::Column::UserId.eq(user_id))
            .filter(inventory::Column::ItemId.eq(item_id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn find_entry(
        &self,
        user_id: i64,
        item_id: i64,
    ) -> AppResult<Option<inventory::Model>> {
        let entry = inventory::Entity::find()
            .filter(inventory::Column::UserId.eq(user_id))
            .filter(inventory::Column::ItemId.eq(item_id))
            .one(&self.pool)
            .await?;
        Ok(entry)
    }

    /// 用户库存列表, 物品信息在读取时关联 (物品下线后仍可展示)
    pub async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<InventoryItemResponse>> {
        let entries = inventory::Entity::find()
            .filter(inventory::Column::UserId.eq(user_id))
            .order_by_desc(inventory::Column::UpdatedAt)
            .all(&self.pool)
            .await?;

        let item_ids: Vec<i64> = entries.iter().map(|e| e.item_id).collect();
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

        Ok(entries
            .into_iter()
            .map(|entry| {
                let item = catalog.get(&entry.item_id);
                InventoryItemResponse::from_parts(entry, item)
            })
            .collect())
    }
}
