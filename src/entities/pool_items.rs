use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::weighted_selector::Weighted;

/// Item rank, a closed set. `S` is the rarest.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum Rank {
    #[sea_orm(string_value = "S")]
    S,
    #[sea_orm(string_value = "A")]
    A,
    #[sea_orm(string_value = "B")]
    B,
    #[sea_orm(string_value = "C")]
    C,
    #[sea_orm(string_value = "D")]
    D,
    #[sea_orm(string_value = "F")]
    F,
}

impl Rank {
    /// Display order, rarest first.
    pub fn sort_order(&self) -> u8 {
        match self {
            Rank::S => 0,
            Rank::A => 1,
            Rank::B => 2,
            Rank::C => 3,
            Rank::D => 4,
            Rank::F => 5,
        }
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Rank::S => "S",
            Rank::A => "A",
            Rank::B => "B",
            Rank::C => "C",
            Rank::D => "D",
            Rank::F => "F",
        };
        write!(f, "{s}")
    }
}

/// 奖池物品
/// 概念说明:
/// - pool_id: 所属奖池 (一个物品只属于一个奖池)
/// - weight: 抽中权重, 概率 = weight / 奖池内启用物品权重之和
/// - external_product_id: 关联的商城商品 (可空); 非空时中奖后会在商城下单
/// - reference_price: 参考价值, 仅展示
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "pool_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub pool_id: String,
    pub external_product_id: Option<i64>,
    pub name: String,
    pub image_url: String,
    pub rank: Rank,
    pub reference_price: i64,
    pub weight: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Weighted for Model {
    fn weight(&self) -> i64 {
        self.weight
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
