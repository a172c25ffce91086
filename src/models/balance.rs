use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::entities::currency_balance_entity as balances;

/// 余额查询参数
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BalanceQuery {
    /// 商城客户ID
    pub customer_id: i64,
}

/// 余额响应
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    pub customer_id: i64,
    /// 当前余额 (xu)
    pub amount: i64,
}

impl From<balances::Model> for BalanceResponse {
    fn from(m: balances::Model) -> Self {
        BalanceResponse {
            customer_id: m.user_id,
            amount: m.amount,
        }
    }
}
