//! 抽奖事务引擎
//!
//! 流程 (saga):
//! 1. 条件扣款 (独立事务). 余额不足直接拒绝, 不写任何记录。
//! 2. 扣款提交后进入 "in flight": 解析奖池、按权重抽取。
//! 3. 成功: 同一事务内写入库存 (+1)、成功历史、待履约订单。
//! 4. 任何失败: 同一事务内退回 `cost` 并写入 `refunded` 历史;
//!    退款重试后仍失败则尽力写入 `failed` 历史并以 `refund_failed` 记录日志。
//!
//! 第 2 步之后的部分在独立的 tokio 任务里运行, 请求被取消也会走到终态。

use crate::entities::{OutcomeStatus, pool_item_entity as items};
use crate::error::{AppError, AppResult, DrawError, DrawFailureKind, RefundState};
use crate::models::{DrawResponse, WonItem};
use crate::services::weighted_selector::{self, SelectError};
use crate::services::{
    BalanceService, DebitOutcome, FulfillmentQueue, FulfillmentService, HistoryService,
    InventoryService, NewHistoryRecord, PoolService,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use sea_orm::{DatabaseConnection, TransactionTrait};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

const REFUND_ATTEMPTS: u32 = 3;
const DEFAULT_REFUND_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct DrawCommand {
    pub user_id: i64,
    pub pool_id: String,
    pub cost: i64,
    pub client_ip: Option<String>,
}

/// Why an in-flight draw could not produce a prize.
#[derive(Debug)]
struct InFlightFailure {
    kind: DrawFailureKind,
    detail: String,
}

impl InFlightFailure {
    fn new(kind: DrawFailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    fn internal(err: impl std::fmt::Display) -> Self {
        Self::new(DrawFailureKind::InternalError, err.to_string())
    }
}

impl From<SelectError> for InFlightFailure {
    fn from(err: SelectError) -> Self {
        let kind = match err {
            SelectError::Empty => DrawFailureKind::NoEligibleItems,
            SelectError::ZeroTotalWeight
            | SelectError::NegativeWeight(_)
            | SelectError::WeightOverflow => DrawFailureKind::MisconfiguredPool,
            SelectError::DrawOutOfRange { .. } => DrawFailureKind::InternalError,
        };
        Self::new(kind, err.to_string())
    }
}

struct Settled {
    item: items::Model,
    fulfillment_id: Option<i64>,
}

#[derive(Clone)]
pub struct DrawService {
    pool: DatabaseConnection,
    rng: Arc<Mutex<StdRng>>,
    fulfillment: FulfillmentQueue,
    refund_backoff: Duration,
}

impl DrawService {
    pub fn new(pool: DatabaseConnection, fulfillment: FulfillmentQueue) -> Self {
        Self {
            pool,
            rng: Arc::new(Mutex::new(StdRng::from_entropy())),
            fulfillment,
            refund_backoff: DEFAULT_REFUND_BACKOFF,
        }
    }

    /// Replace the random source, e.g. with a seeded one.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Arc::new(Mutex::new(rng));
        self
    }

    pub fn with_refund_backoff(mut self, backoff: Duration) -> Self {
        self.refund_backoff = backoff;
        self
    }

    /// 执行一次抽奖
    pub async fn execute_draw(&self, cmd: DrawCommand) -> AppResult<DrawResponse> {
        if cmd.cost <= 0 {
            return Err(AppError::ValidationError("cost must be positive".into()));
        }
        if cmd.pool_id.trim().is_empty() {
            return Err(AppError::ValidationError("pool_id is required".into()));
        }

        let engine = self.clone();
        tokio::spawn(async move { engine.run(cmd).await })
            .await
            .map_err(|e| AppError::InternalError(format!("draw task did not complete: {e}")))?
    }

    async fn run(&self, cmd: DrawCommand) -> AppResult<DrawResponse> {
        let draw_id = Uuid::new_v4();

        let balance = match self.debit(&cmd).await {
            Ok(DebitOutcome::Applied { balance }) => balance,
            Ok(DebitOutcome::Insufficient { balance }) => {
                return Err(DrawError::rejected(
                    DrawFailureKind::InsufficientFunds,
                    format!("balance {balance} is below cost {}", cmd.cost),
                )
                .into());
            }
            // the debit transaction never committed, nothing to refund
            Err(e) => {
                return Err(DrawError::rejected(
                    DrawFailureKind::InternalError,
                    format!("debit failed: {e}"),
                )
                .into());
            }
        };

        match self.settle(&cmd, draw_id).await {
            Ok(settled) => {
                let fulfillment_queued = match settled.fulfillment_id {
                    Some(id) => self.fulfillment.enqueue(id),
                    None => false,
                };
                log::info!(
                    "Draw succeeded: draw_id={} user_id={} pool_id={} item_id={} cost={} balance={}",
                    draw_id,
                    cmd.user_id,
                    cmd.pool_id,
                    settled.item.id,
                    cmd.cost,
                    balance
                );
                Ok(DrawResponse {
                    draw_id,
                    item: WonItem::from(&settled.item),
                    balance,
                    fulfillment_queued,
                })
            }
            Err(failure) => Err(self.compensate(&cmd, draw_id, failure).await.into()),
        }
    }

    /// Debit in its own transaction so that any error before commit leaves
    /// the balance untouched.
    async fn debit(&self, cmd: &DrawCommand) -> AppResult<DebitOutcome> {
        let txn = self.pool.begin().await?;
        let outcome = BalanceService::debit_on(&txn, cmd.user_id, cmd.cost).await?;
        txn.commit().await?;
        Ok(outcome)
    }

    async fn settle(&self, cmd: &DrawCommand, draw_id: Uuid) -> Result<Settled, InFlightFailure> {
        let candidates = PoolService::active_items_on(&self.pool, Some(cmd.pool_id.as_str()))
            .await
            .map_err(InFlightFailure::internal)?;
        if candidates.is_empty() {
            return Err(InFlightFailure::new(
                DrawFailureKind::NoEligibleItems,
                format!("no active items in pool {}", cmd.pool_id),
            ));
        }

        let item = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            weighted_selector::pick(&candidates, &mut *rng)?.clone()
        };

        let txn = self.pool.begin().await.map_err(InFlightFailure::internal)?;
        let fulfillment_id = async {
            InventoryService::grant_on(&txn, cmd.user_id, item.id).await?;
            HistoryService::append_on(
                &txn,
                NewHistoryRecord {
                    draw_id,
                    user_id: cmd.user_id,
                    item_id: Some(item.id),
                    amount_debited: cmd.cost,
                    pool_id: cmd.pool_id.clone(),
                    client_ip: cmd.client_ip.clone(),
                    outcome_status: OutcomeStatus::Success,
                    failure_kind: None,
                    error_detail: None,
                },
            )
            .await?;
            let pending =
                FulfillmentService::create_pending_on(&txn, draw_id, cmd.user_id, &item).await?;
            AppResult::Ok(pending.map(|row| row.id))
        }
        .await
        .map_err(InFlightFailure::internal)?;
        txn.commit().await.map_err(InFlightFailure::internal)?;

        Ok(Settled {
            item,
            fulfillment_id,
        })
    }

    /// 退回扣款; 返回给调用方的错误携带退款状态
    async fn compensate(
        &self,
        cmd: &DrawCommand,
        draw_id: Uuid,
        failure: InFlightFailure,
    ) -> DrawError {
        let mut last_error = String::new();
        for attempt in 1..=REFUND_ATTEMPTS {
            match self.refund_once(cmd, draw_id, &failure).await {
                Ok(balance) => {
                    log::warn!(
                        "Draw refunded: kind={} draw_id={} user_id={} pool_id={} cost={} balance={} detail={}",
                        failure.kind,
                        draw_id,
                        cmd.user_id,
                        cmd.pool_id,
                        cmd.cost,
                        balance,
                        failure.detail
                    );
                    return DrawError {
                        kind: failure.kind,
                        detail: failure.detail,
                        refund: RefundState::Refunded,
                    };
                }
                Err(e) => {
                    log::error!(
                        "Refund attempt {attempt}/{REFUND_ATTEMPTS} failed: draw_id={draw_id} error={e}"
                    );
                    last_error = e.to_string();
                    if attempt < REFUND_ATTEMPTS {
                        tokio::time::sleep(self.refund_backoff * attempt).await;
                    }
                }
            }
        }

        let detail = format!("{}; refund failed: {}", failure.detail, last_error);
        let record = self.failure_record(cmd, draw_id, OutcomeStatus::Failed, failure.kind, &detail);
        if let Err(e) = HistoryService::append_on(&self.pool, record).await {
            log::error!("Failed to record unrefunded draw: draw_id={draw_id} error={e}");
        }
        log::error!(
            "Draw refund failed: kind=refund_failed cause={} draw_id={} user_id={} cost={} detail={}",
            failure.kind,
            draw_id,
            cmd.user_id,
            cmd.cost,
            detail
        );
        DrawError {
            kind: failure.kind,
            detail: failure.detail,
            refund: RefundState::RefundFailed,
        }
    }

    async fn refund_once(
        &self,
        cmd: &DrawCommand,
        draw_id: Uuid,
        failure: &InFlightFailure,
    ) -> AppResult<i64> {
        let txn = self.pool.begin().await?;
        let balance = BalanceService::credit_on(&txn, cmd.user_id, cmd.cost).await?;
        let record = self.failure_record(
            cmd,
            draw_id,
            OutcomeStatus::Refunded,
            failure.kind,
            &failure.detail,
        );
        HistoryService::append_on(&txn, record).await?;
        txn.commit().await?;
        Ok(balance)
    }

    fn failure_record(
        &self,
        cmd: &DrawCommand,
        draw_id: Uuid,
        status: OutcomeStatus,
        kind: DrawFailureKind,
        detail: &str,
    ) -> NewHistoryRecord {
        NewHistoryRecord {
            draw_id,
            user_id: cmd.user_id,
            item_id: None,
            amount_debited: cmd.cost,
            pool_id: cmd.pool_id.clone(),
            client_ip: cmd.client_ip.clone(),
            outcome_status: status,
            failure_kind: Some(kind.as_str().to_string()),
            error_detail: Some(detail.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        FulfillmentStatus, draw_history_entity as history, fulfillment_order_entity,
        inventory_entry_entity as inventory,
    };
    use crate::test_support::{ItemSeed, seed_item, setup_db};
    use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
    use tokio::sync::mpsc::UnboundedReceiver;

    const USER: i64 = 42;

    fn engine(db: &DatabaseConnection) -> (DrawService, UnboundedReceiver<i64>) {
        let (queue, rx) = FulfillmentQueue::channel();
        let svc = DrawService::new(db.clone(), queue)
            .with_rng(StdRng::seed_from_u64(7))
            .with_refund_backoff(Duration::from_millis(1));
        (svc, rx)
    }

    fn cmd(pool_id: &str, cost: i64) -> DrawCommand {
        DrawCommand {
            user_id: USER,
            pool_id: pool_id.to_string(),
            cost,
            client_ip: Some("10.0.0.1".to_string()),
        }
    }

    async fn balance(db: &DatabaseConnection) -> i64 {
        BalanceService::current_on(db, USER).await.unwrap()
    }

    async fn history_rows(db: &DatabaseConnection) -> Vec<history::Model> {
        history::Entity::find()
            .filter(history::Column::UserId.eq(USER))
            .all(db)
            .await
            .unwrap()
    }

    fn draw_error(result: AppResult<DrawResponse>) -> DrawError {
        match result {
            Err(AppError::DrawFailed(e)) => e,
            other => panic!("expected draw failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_insufficient_funds_is_pure_rejection() {
        let db = setup_db().await;
        seed_item(&db, ItemSeed::new("p1", "A", 1)).await;
        BalanceService::credit_on(&db, USER, 100).await.unwrap();
        let (svc, _rx) = engine(&db);

        let err = draw_error(svc.execute_draw(cmd("p1", 150)).await);
        assert_eq!(err.kind, DrawFailureKind::InsufficientFunds);
        assert_eq!(err.refund, RefundState::NotDebited);
        assert_eq!(balance(&db).await, 100);
        assert!(history_rows(&db).await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_user_is_rejected_without_creating_balance() {
        let db = setup_db().await;
        seed_item(&db, ItemSeed::new("p1", "A", 1)).await;
        let (svc, _rx) = engine(&db);

        let err = draw_error(svc.execute_draw(cmd("p1", 1)).await);
        assert_eq!(err.kind, DrawFailureKind::InsufficientFunds);
        let rows = crate::entities::currency_balance_entity::Entity::find()
            .all(&db)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let db = setup_db().await;
        let (svc, _rx) = engine(&db);
        assert!(matches!(
            svc.execute_draw(cmd("p1", 0)).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            svc.execute_draw(cmd("  ", 10)).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_pool_is_refunded() {
        let db = setup_db().await;
        seed_item(&db, ItemSeed::new("p1", "Retired", 5).inactive()).await;
        BalanceService::credit_on(&db, USER, 100).await.unwrap();
        let (svc, _rx) = engine(&db);

        let err = draw_error(svc.execute_draw(cmd("p1", 50)).await);
        assert_eq!(err.kind, DrawFailureKind::NoEligibleItems);
        assert_eq!(err.refund, RefundState::Refunded);
        assert_eq!(balance(&db).await, 100);

        let rows = history_rows(&db).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].outcome_status, OutcomeStatus::Refunded);
        assert_eq!(rows[0].amount_debited, 50);
        assert_eq!(rows[0].item_id, None);
        assert_eq!(rows[0].failure_kind.as_deref(), Some("no_eligible_items"));
        assert!(rows[0].error_detail.is_some());
    }

    #[tokio::test]
    async fn test_zero_weight_pool_is_refunded() {
        let db = setup_db().await;
        seed_item(&db, ItemSeed::new("p1", "A", 0)).await;
        seed_item(&db, ItemSeed::new("p1", "B", 0)).await;
        BalanceService::credit_on(&db, USER, 100).await.unwrap();
        let (svc, _rx) = engine(&db);

        let err = draw_error(svc.execute_draw(cmd("p1", 30)).await);
        assert_eq!(err.kind, DrawFailureKind::MisconfiguredPool);
        assert_eq!(err.refund, RefundState::Refunded);
        assert_eq!(balance(&db).await, 100);
        let rows = history_rows(&db).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].failure_kind.as_deref(), Some("misconfigured_pool"));
    }

    #[tokio::test]
    async fn test_successful_draw_updates_everything_once() {
        let db = setup_db().await;
        let winner = seed_item(&db, ItemSeed::new("p1", "Winner", 10)).await;
        seed_item(&db, ItemSeed::new("p1", "Never", 0)).await;
        seed_item(&db, ItemSeed::new("p2", "Elsewhere", 100)).await;
        BalanceService::credit_on(&db, USER, 100).await.unwrap();
        let (svc, mut rx) = engine(&db);

        let res = svc.execute_draw(cmd("p1", 30)).await.unwrap();
        assert_eq!(res.item.id, winner.id);
        assert_eq!(res.item.name, "Winner");
        assert_eq!(res.balance, 70);
        assert!(!res.fulfillment_queued);
        assert_eq!(balance(&db).await, 70);

        let entry = inventory::Entity::find()
            .filter(inventory::Column::UserId.eq(USER))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.item_id, winner.id);
        assert_eq!(entry.quantity, 1);

        let rows = history_rows(&db).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].outcome_status, OutcomeStatus::Success);
        assert_eq!(rows[0].item_id, Some(winner.id));
        assert_eq!(rows[0].amount_debited, 30);
        assert_eq!(rows[0].draw_id, res.draw_id);
        assert_eq!(rows[0].client_ip.as_deref(), Some("10.0.0.1"));

        svc.execute_draw(cmd("p1", 30)).await.unwrap();
        let entry = inventory::Entity::find_by_id(entry.id).one(&db).await.unwrap().unwrap();
        assert_eq!(entry.quantity, 2);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_external_item_is_queued_for_fulfillment() {
        let db = setup_db().await;
        seed_item(&db, ItemSeed::new("p1", "Figure", 1).external(9090)).await;
        BalanceService::credit_on(&db, USER, 10).await.unwrap();
        let (svc, mut rx) = engine(&db);

        let res = svc.execute_draw(cmd("p1", 10)).await.unwrap();
        assert!(res.fulfillment_queued);

        let queued = rx.try_recv().unwrap();
        let row = fulfillment_order_entity::Entity::find_by_id(queued)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.draw_id, res.draw_id);
        assert_eq!(row.external_product_id, 9090);
        assert_eq!(row.status, FulfillmentStatus::Pending);
    }

    #[tokio::test]
    async fn test_storage_fault_after_debit_is_refunded() {
        let db = setup_db().await;
        seed_item(&db, ItemSeed::new("p1", "A", 1)).await;
        BalanceService::credit_on(&db, USER, 100).await.unwrap();
        db.execute_unprepared("DROP TABLE inventory_entries")
            .await
            .unwrap();
        let (svc, _rx) = engine(&db);

        let err = draw_error(svc.execute_draw(cmd("p1", 40)).await);
        assert_eq!(err.kind, DrawFailureKind::InternalError);
        assert_eq!(err.refund, RefundState::Refunded);
        assert_eq!(balance(&db).await, 100);

        let rows = history_rows(&db).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].outcome_status, OutcomeStatus::Refunded);
        assert_eq!(rows[0].failure_kind.as_deref(), Some("internal_error"));
    }

    #[tokio::test]
    async fn test_storage_fault_during_debit_is_rejected() {
        let db = setup_db().await;
        seed_item(&db, ItemSeed::new("p1", "A", 1)).await;
        db.execute_unprepared("DROP TABLE currency_balances")
            .await
            .unwrap();
        let (svc, _rx) = engine(&db);

        let err = draw_error(svc.execute_draw(cmd("p1", 40)).await);
        assert_eq!(err.kind, DrawFailureKind::InternalError);
        assert_eq!(err.refund, RefundState::NotDebited);
        assert!(history_rows(&db).await.is_empty());
    }

    #[tokio::test]
    async fn test_refund_failure_is_reported() {
        let db = setup_db().await;
        seed_item(&db, ItemSeed::new("p1", "A", 1)).await;
        BalanceService::credit_on(&db, USER, 100).await.unwrap();
        db.execute_unprepared("DROP TABLE draw_history").await.unwrap();
        let (svc, _rx) = engine(&db);

        let err = draw_error(svc.execute_draw(cmd("p1", 40)).await);
        assert_eq!(err.kind, DrawFailureKind::InternalError);
        assert_eq!(err.refund, RefundState::RefundFailed);
        // the refund transaction rolled back with the history insert
        assert_eq!(balance(&db).await, 60);
    }

    #[tokio::test]
    async fn test_concurrent_draws_never_overspend() {
        let db = setup_db().await;
        seed_item(&db, ItemSeed::new("p1", "A", 1)).await;
        BalanceService::credit_on(&db, USER, 100).await.unwrap();
        let (svc, _rx) = engine(&db);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.execute_draw(cmd("p1", 30)).await })
            })
            .collect();

        let mut succeeded = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(AppError::DrawFailed(e)) => {
                    assert_eq!(e.kind, DrawFailureKind::InsufficientFunds);
                    rejected += 1;
                }
                Err(e) => panic!("unexpected error {e}"),
            }
        }
        assert_eq!(succeeded, 3);
        assert_eq!(rejected, 7);
        assert_eq!(balance(&db).await, 10);

        // initial credit == balance + sum of successful debits
        let spent: i64 = history_rows(&db)
            .await
            .iter()
            .filter(|r| r.outcome_status == OutcomeStatus::Success)
            .map(|r| r.amount_debited)
            .sum();
        assert_eq!(balance(&db).await + spent, 100);
    }

    #[tokio::test]
    async fn test_seeded_engines_pick_the_same_items() {
        let db = setup_db().await;
        for (name, weight) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
            seed_item(&db, ItemSeed::new("p1", name, weight)).await;
        }
        BalanceService::credit_on(&db, USER, 1000).await.unwrap();
        let (first, _rx1) = engine(&db);
        let (second, _rx2) = engine(&db);

        for _ in 0..5 {
            let a = first.execute_draw(cmd("p1", 1)).await.unwrap();
            let b = second.execute_draw(cmd("p1", 1)).await.unwrap();
            assert_eq!(a.item.id, b.item.id);
        }
    }
}
