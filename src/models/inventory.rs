use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::entities::{InventoryStatus, Rank, inventory_entry_entity as inventory, pool_item_entity as items};

use super::history::{DEFAULT_ITEM_IMAGE, UNKNOWN_ITEM_NAME};

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InventoryQuery {
    pub customer_id: i64,
}

/// 库存条目
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InventoryItemResponse {
    pub item_id: i64,
    pub item_name: String,
    pub item_image: String,
    /// 物品已下线时为空
    pub rank: Option<Rank>,
    pub quantity: i64,
    pub status: InventoryStatus,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItemResponse {
    pub fn from_parts(entry: inventory::Model, item: Option<&items::Model>) -> Self {
        InventoryItemResponse {
            item_id: entry.item_id,
            item_name: item
                .map(|i| i.name.clone())
                .unwrap_or_else(|| UNKNOWN_ITEM_NAME.to_string()),
            item_image: item
                .map(|i| i.image_url.clone())
                .unwrap_or_else(|| DEFAULT_ITEM_IMAGE.to_string()),
            rank: item.map(|i| i.rank),
            quantity: entry.quantity,
            status: entry.status,
            updated_at: entry.updated_at,
        }
    }
}
