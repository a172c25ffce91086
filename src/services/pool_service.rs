use crate::entities::pool_item_entity as items;
use crate::error::AppResult;
use crate::models::PoolItemResponse;
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

/// 奖池解析: 只读取启用的物品
#[derive(Clone)]
pub struct PoolService {
    pool: DatabaseConnection,
}

impl PoolService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 获取启用物品列表（可按奖池过滤），按稀有度再按ID排序
    pub async fn list_items(&self, pool_id: Option<&str>) -> AppResult<Vec<PoolItemResponse>> {
        let mut list = Self::active_items_on(&self.pool, pool_id).await?;
        list.sort_by_key(|item| (item.rank.sort_order(), item.id));
        Ok(list.into_iter().map(Into::into).collect())
    }

    /// Active items in id order. The order is the selector's tie-break, so it
    /// must be stable between calls.
    pub async fn active_items_on<C: ConnectionTrait>(
        conn: &C,
        pool_id: Option<&str>,
    ) -> AppResult<Vec<items::Model>> {
        let mut query = items::Entity::find().filter(items::Column::IsActive.eq(true));
        if let Some(pool_id) = pool_id {
            query = query.filter(items::Column::PoolId.eq(pool_id));
        }
        let list = query.order_by_asc(items::Column::Id).all(conn).await?;
        Ok(list)
    }
}
