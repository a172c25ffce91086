use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::entities::{Rank, pool_item_entity as items};

/// 物品列表查询参数
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ItemsQuery {
    /// 奖池ID (不传则返回全部启用物品)
    #[serde(alias = "gacha_pool_id")]
    pub pool_id: Option<String>,
}

/// 奖池物品公开信息
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PoolItemResponse {
    pub id: i64,
    pub pool_id: String,
    pub name: String,
    pub image_url: String,
    pub rank: Rank,
    /// 参考价值 (仅展示)
    pub reference_price: i64,
    /// 抽中权重
    pub weight: i64,
}

impl From<items::Model> for PoolItemResponse {
    fn from(m: items::Model) -> Self {
        PoolItemResponse {
            id: m.id,
            pool_id: m.pool_id,
            name: m.name,
            image_url: m.image_url,
            rank: m.rank,
            reference_price: m.reference_price,
            weight: m.weight,
        }
    }
}

/// 抽奖请求
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DrawRequest {
    pub customer_id: i64,
    #[serde(alias = "gacha_pool_id")]
    pub pool_id: String,
    /// 本次抽奖消耗的 xu
    #[serde(alias = "gacha_cost")]
    pub cost: i64,
}

/// 抽中的物品 (隐藏权重等内部字段)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WonItem {
    pub id: i64,
    pub name: String,
    pub image_url: String,
    pub rank: Rank,
    pub reference_price: i64,
}

impl From<&items::Model> for WonItem {
    fn from(m: &items::Model) -> Self {
        WonItem {
            id: m.id,
            name: m.name.clone(),
            image_url: m.image_url.clone(),
            rank: m.rank,
            reference_price: m.reference_price,
        }
    }
}

/// 抽奖结果
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DrawResponse {
    pub draw_id: Uuid,
    pub item: WonItem,
    /// 扣款后的余额
    pub balance: i64,
    /// 是否已排队在商城下单
    pub fulfillment_queued: bool,
}
