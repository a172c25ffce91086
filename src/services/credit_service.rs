use crate::config::CurrencyConfig;
use crate::entities::processed_payment_entity as processed;
use crate::error::{AppError, AppResult};
use crate::models::OrderPaidEvent;
use crate::services::BalanceService;
use chrono::Utc;
use sea_orm::sea_query::{OnConflict, Query};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::Serialize;

/// 入账结果; 除 Credited 外均不改动余额
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CreditOutcome {
    Credited {
        user_id: i64,
        amount: i64,
        balance: i64,
    },
    Duplicate,
    NotPaid,
    NotCurrencyOrder,
    ZeroCredit,
}

impl CreditOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            CreditOutcome::Credited { .. } => "credited",
            CreditOutcome::Duplicate => "duplicate",
            CreditOutcome::NotPaid => "not_paid",
            CreditOutcome::NotCurrencyOrder => "not_currency_order",
            CreditOutcome::ZeroCredit => "zero_credit",
        }
    }
}

/// 商城付款 -> xu 入账, 每个外部订单只入账一次
#[derive(Clone)]
pub struct CreditService {
    pool: DatabaseConnection,
    currency: CurrencyConfig,
}

impl CreditService {
    pub fn new(pool: DatabaseConnection, currency: CurrencyConfig) -> Self {
        Self { pool, currency }
    }

    /// 匹配的明细行: floor(Σ price × quantity / exchange_rate); 无匹配行返回 None.
    /// 匹配行的数量或单价不为正数、或结果超出 i64 范围时视为格式错误.
    pub fn credit_for(&self, event: &OrderPaidEvent) -> AppResult<Option<i64>> {
        let mut matched = false;
        let mut total = 0.0_f64;
        for line in &event.line_items {
            if line.product_id != Some(self.currency.product_id) {
                continue;
            }
            if line.quantity <= 0 || !line.price.is_finite() || line.price <= 0.0 {
                return Err(AppError::ValidationError(format!(
                    "invalid currency line in order {}: price={} quantity={}",
                    event.id, line.price, line.quantity
                )));
            }
            matched = true;
            total += line.price * line.quantity as f64;
        }
        if !matched {
            return Ok(None);
        }
        let credit = (total / self.currency.exchange_rate as f64).floor();
        // i64::MAX as f64 rounds up to 2^63, which is already out of range
        if !credit.is_finite() || credit >= i64::MAX as f64 {
            return Err(AppError::ValidationError(format!(
                "credit for order {} is out of range",
                event.id
            )));
        }
        Ok(Some(credit as i64))
    }

    pub async fn apply(&self, event: &OrderPaidEvent) -> AppResult<CreditOutcome> {
        let outcome = self.apply_inner(event).await?;
        match &outcome {
            CreditOutcome::Credited {
                user_id,
                amount,
                balance,
            } => log::info!(
                "Payment credited: order_id={} user_id={} amount={} balance={}",
                event.id,
                user_id,
                amount,
                balance
            ),
            other => log::info!(
                "Payment skipped: kind={} order_id={} user_id={}",
                other.kind(),
                event.id,
                event.customer.id
            ),
        }
        Ok(outcome)
    }

    async fn apply_inner(&self, event: &OrderPaidEvent) -> AppResult<CreditOutcome> {
        if !event.is_paid() {
            return Ok(CreditOutcome::NotPaid);
        }
        let amount = match self.credit_for(event)? {
            None => return Ok(CreditOutcome::NotCurrencyOrder),
            Some(a) if a <= 0 => return Ok(CreditOutcome::ZeroCredit),
            Some(a) => a,
        };
        let user_id = event.customer.id;

        let txn = self.pool.begin().await?;

        let insert = Query::insert()
            .into_table(processed::Entity)
            .columns([
                processed::Column::ExternalOrderId,
                processed::Column::UserId,
                processed::Column::CreditAmount,
                processed::Column::CreatedAt,
            ])
            .values_panic([
                event.id.clone().into(),
                user_id.into(),
                amount.into(),
                Utc::now().into(),
            ])
            .on_conflict(
                OnConflict::column(processed::Column::ExternalOrderId)
                    .do_nothing()
                    .to_owned(),
            )
            .to_owned();
        let backend = txn.get_database_backend();
        let inserted = txn.execute(backend.build(&insert)).await?.rows_affected();
        if inserted == 0 {
            txn.rollback().await?;
            return Ok(CreditOutcome::Duplicate);
        }

        let balance = BalanceService::credit_on(&txn, user_id, amount).await?;
        txn.commit().await?;

        Ok(CreditOutcome::Credited {
            user_id,
            amount,
            balance,
        })
    }
}
