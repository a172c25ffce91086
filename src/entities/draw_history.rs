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
pub enum OutcomeStatus {
    /// Prize granted.
    #[sea_orm(string_value = "success")]
    Success,
    /// Debit happened and could not be reversed.
    #[sea_orm(string_value = "failed")]
    Failed,
    /// Debit happened and was credited back.
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::Success => write!(f, "success"),
            OutcomeStatus::Failed => write!(f, "failed"),
            OutcomeStatus::Refunded => write!(f, "refunded"),
        }
    }
}

/// 抽奖历史 (只追加, 从不修改)
/// 说明:
/// - item_id 为空表示本次抽奖失败并已退款 (或退款失败)
/// - 物品名称/图片不冗余存储, 读取时按 item_id 关联
/// - failure_kind 为稳定的错误类别, error_detail 为可读描述
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "draw_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub draw_id: Uuid,
    pub user_id: i64,
    pub item_id: Option<i64>,
    pub amount_debited: i64,
    pub pool_id: String,
    pub client_ip: Option<String>,
    pub outcome_status: OutcomeStatus,
    pub failure_kind: Option<String>,
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
