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
pub enum InventoryStatus {
    #[sea_orm(string_value = "owned")]
    Owned,
    #[sea_orm(string_value = "pending_delivery")]
    PendingDelivery,
    #[sea_orm(string_value = "delivered")]
    Delivered,
}

impl std::fmt::Display for InventoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InventoryStatus::Owned => write!(f, "owned"),
            InventoryStatus::PendingDelivery => write!(f, "pending_delivery"),
            InventoryStatus::Delivered => write!(f, "delivered"),
        }
    }
}

/// 用户物品库存, (user_id, item_id) 唯一, 每次中奖 quantity + 1
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub item_id: i64,
    pub quantity: i64,
    pub status: InventoryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
