use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "created")]
    Created,
    #[sea_orm(string_value = "failed")]
    Failed,
    /// Gave up after the configured number of attempts.
    #[sea_orm(string_value = "abandoned")]
    Abandoned,
}

impl FulfillmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FulfillmentStatus::Created | FulfillmentStatus::Abandoned)
    }
}

impl std::fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FulfillmentStatus::Pending => write!(f, "pending"),
            FulfillmentStatus::Created => write!(f, "created"),
            FulfillmentStatus::Failed => write!(f, "failed"),
            FulfillmentStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// 商城履约订单
/// 抽中关联商城商品的物品时, 与抽奖记录同一事务写入 pending 行,
/// 由后台 worker 调用商城接口下单, 失败会被定时任务重试
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "fulfillment_orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub draw_id: Uuid,
    pub user_id: i64,
    pub item_id: i64,
    pub external_product_id: i64,
    pub status: FulfillmentStatus,
    pub attempts: i32,
    pub external_order_id: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
