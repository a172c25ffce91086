use crate::entities::currency_balance_entity as balances;
use crate::error::{AppError, AppResult};
use crate::models::BalanceResponse;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict, Query};
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter};

/// Result of a conditional debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    Applied { balance: i64 },
    Insufficient { balance: i64 },
}

/// 余额账本
///
/// 所有变更都是单条 SQL:
/// - 扣款: `UPDATE ... SET amount = amount - cost WHERE user_id = ? AND amount >= cost`
/// - 加款: `INSERT ... ON CONFLICT (user_id) DO UPDATE SET amount = amount + delta`
///
/// 同一用户的并发扣款由数据库行锁线性化, 不需要进程内锁, 多实例部署同样成立。
#[derive(Clone)]
pub struct BalanceService {
    pool: DatabaseConnection,
}

impl BalanceService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 获取余额（不存在则初始化为 0）
    pub async fn get_balance(&self, user_id: i64) -> AppResult<BalanceResponse> {
        let model = Self::ensure_on(&self.pool, user_id).await?;
        Ok(model.into())
    }

    pub async fn debit(&self, user_id: i64, amount: i64) -> AppResult<DebitOutcome> {
        Self::debit_on(&self.pool, user_id, amount).await
    }

    pub async fn credit(&self, user_id: i64, amount: i64) -> AppResult<i64> {
        Self::credit_on(&self.pool, user_id, amount).await
    }

    /// Creates the zero-balance row if missing and returns the current row.
    pub async fn ensure_on<C: ConnectionTrait>(
        conn: &C,
        user_id: i64,
    ) -> AppResult<balances::Model> {
        let now = Utc::now();
        let insert = Query::insert()
            .into_table(balances::Entity)
            .columns([
                balances::Column::UserId,
                balances::Column::Amount,
                balances::Column::CreatedAt,
                balances::Column::UpdatedAt,
            ])
            .values_panic([user_id.into(), 0i64.into(), now.into(), now.into()])
            .on_conflict(
                OnConflict::column(balances::Column::UserId)
                    .do_nothing()
                    .to_owned(),
            )
            .to_owned();
        let backend = conn.get_database_backend();
        conn.execute(backend.build(&insert)).await?;

        balances::Entity::find()
            .filter(balances::Column::UserId.eq(user_id))
            .one(conn)
            .await?
            .ok_or_else(|| AppError::InternalError(format!("balance row for {user_id} vanished")))
    }

    /// Current amount without creating a row; absent means 0.
    pub async fn current_on<C: ConnectionTrait>(conn: &C, user_id: i64) -> AppResult<i64> {
        let amount = balances::Entity::find()
            .filter(balances::Column::UserId.eq(user_id))
            .one(conn)
            .await?
            .map(|m| m.amount)
            .unwrap_or(0);
        Ok(amount)
    }

    /// Atomic check-and-decrement. Never creates a row and never mutates
    /// anything when the balance cannot cover `amount`.
    pub async fn debit_on<C: ConnectionTrait>(
        conn: &C,
        user_id: i64,
        amount: i64,
    ) -> AppResult<DebitOutcome> {
        if amount <= 0 {
            return Err(AppError::ValidationError(
                "Debit amount must be positive".into(),
            ));
        }

        let result = balances::Entity::update_many()
            .col_expr(
                balances::Column::Amount,
                Expr::col(balances::Column::Amount).sub(amount),
            )
            .col_expr(balances::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(balances::Column::UserId.eq(user_id))
            .filter(balances::Column::Amount.gte(amount))
            .exec(conn)
            .await?;

        let balance = Self::current_on(conn, user_id).await?;
        if result.rows_affected == 1 {
            Ok(DebitOutcome::Applied { balance })
        } else {
            Ok(DebitOutcome::Insufficient { balance })
        }
    }

    /// Upsert-or-increment; returns the balance after the credit.
    pub async fn credit_on<C: ConnectionTrait>(
        conn: &C,
        user_id: i64,
        amount: i64,
    ) -> AppResult<i64> {
        if amount <= 0 {
            return Err(AppError::ValidationError(
                "Credit amount must be positive".into(),
            ));
        }

        let now = Utc::now();
        let upsert = Query::insert()
            .into_table(balances::Entity)
            .columns([
                balances::Column::UserId,
                balances::Column::Amount,
                balances::Column::CreatedAt,
                balances::Column::UpdatedAt,
            ])
            .values_panic([user_id.into(), amount.into(), now.into(), now.into()])
            .on_conflict(
                OnConflict::column(balances::Column::UserId)
                    .value(
                        balances::Column::Amount,
                        Expr::col((balances::Entity, balances::Column::Amount)).add(amount),
                    )
                    .value(balances::Column::UpdatedAt, now)
                    .to_owned(),
            )
            .to_owned();
        let backend = conn.get_database_backend();
        conn.execute(backend.build(&upsert)).await?;

        Self::current_on(conn, user_id).await
    }
}
