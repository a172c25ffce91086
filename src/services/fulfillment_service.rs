//! 商城履约
//!
//! 抽中关联商城商品的物品后, 抽奖事务内会写入一条 `pending` 的
//! `fulfillment_orders`; 提交后把 id 放进内存队列, 由后台 worker 调用商城
//! 下单。接口失败只记录在该行上, 不影响抽奖结果; 定时任务会重试
//! `pending`/`failed` 且已冷却的行, 超过最大次数后标记为 `abandoned`。

use crate::entities::{
    FulfillmentStatus, InventoryStatus, fulfillment_order_entity as fulfillment,
    pool_item_entity as items,
};
use crate::error::{AppError, AppResult};
use crate::models::UNKNOWN_ITEM_NAME;
use crate::services::InventoryService;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// 下单所需的信息
#[derive(Debug, Clone, PartialEq)]
pub struct FulfillmentRequest {
    pub draw_id: Uuid,
    pub customer_id: i64,
    pub product_id: i64,
    pub item_name: String,
    pub pool_id: String,
}

/// 外部商城下单接口, 返回外部订单号
#[async_trait]
pub trait FulfillmentGateway: Send + Sync {
    async fn place_order(&self, request: &FulfillmentRequest) -> AppResult<String>;
}

/// 待处理履约 id 的进程内队列
#[derive(Clone)]
pub struct FulfillmentQueue {
    tx: mpsc::UnboundedSender<i64>,
}

impl FulfillmentQueue {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<i64>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns false when the worker is gone; the row stays pending and the
    /// retry loop picks it up.
    pub fn enqueue(&self, fulfillment_id: i64) -> bool {
        match self.tx.send(fulfillment_id) {
            Ok(()) => true,
            Err(_) => {
                log::warn!(
                    "Fulfillment queue closed, order {fulfillment_id} left for the retry loop"
                );
                false
            }
        }
    }
}

#[derive(Clone)]
pub struct FulfillmentService {
    pool: DatabaseConnection,
    gateway: Arc<dyn FulfillmentGateway>,
    max_attempts: i32,
    cooldown: Duration,
}

impl FulfillmentService {
    pub fn new(
        pool: DatabaseConnection,
        gateway: Arc<dyn FulfillmentGateway>,
        max_attempts: i32,
        cooldown_secs: u64,
    ) -> Self {
        Self {
            pool,
            gateway,
            max_attempts,
            cooldown: Duration::seconds(cooldown_secs as i64),
        }
    }

    /// 抽奖事务内调用; 物品未关联商城商品时不写入
    pub async fn create_pending_on<C: ConnectionTrait>(
        conn: &C,
        draw_id: Uuid,
        user_id: i64,
        item: &items::Model,
    ) -> AppResult<Option<fulfillment::Model>> {
        let Some(product_id) = item.external_product_id else {
            return Ok(None);
        };
        let now = Utc::now();
        let model = fulfillment::ActiveModel {
            draw_id: Set(draw_id),
            user_id: Set(user_id),
            item_id: Set(item.id),
            external_product_id: Set(product_id),
            status: Set(FulfillmentStatus::Pending),
            attempts: Set(0),
            external_order_id: Set(None),
            last_error: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(conn)
        .await?;
        Ok(Some(model))
    }

    pub async fn find(&self, fulfillment_id: i64) -> AppResult<Option<fulfillment::Model>> {
        let row = fulfillment::Entity::find_by_id(fulfillment_id)
            .one(&self.pool)
            .await?;
        Ok(row)
    }

    /// Claims the row by bumping `attempts` from the value just read. A second
    /// processor that read the same row loses the race and skips it.
    async fn claim(&self, row: &fulfillment::Model) -> AppResult<bool> {
        let result = fulfillment::Entity::update_many()
            .col_expr(
                fulfillment::Column::Attempts,
                Expr::col(fulfillment::Column::Attempts).add(1),
            )
            .col_expr(fulfillment::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(fulfillment::Column::Id.eq(row.id))
            .filter(fulfillment::Column::Attempts.eq(row.attempts))
            .filter(
                fulfillment::Column::Status
                    .is_in([FulfillmentStatus::Pending, FulfillmentStatus::Failed]),
            )
            .exec(&self.pool)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// 处理一条履约记录, 返回处理后的状态
    pub async fn process(&self, fulfillment_id: i64) -> AppResult<FulfillmentStatus> {
        let row = self
            .find(fulfillment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("fulfillment order {fulfillment_id}")))?;
        if row.status.is_terminal() {
            return Ok(row.status);
        }
        if !self.claim(&row).await? {
            log::debug!("Fulfillment {fulfillment_id} claimed by another worker");
            return Ok(row.status);
        }
        let attempt = row.attempts + 1;

        let item = items::Entity::find_by_id(row.item_id).one(&self.pool).await?;
        let request = FulfillmentRequest {
            draw_id: row.draw_id,
            customer_id: row.user_id,
            product_id: row.external_product_id,
            item_name: item
                .as_ref()
                .map(|i| i.name.clone())
                .unwrap_or_else(|| UNKNOWN_ITEM_NAME.to_string()),
            pool_id: item.map(|i| i.pool_id).unwrap_or_default(),
        };

        let mut active: fulfillment::ActiveModel = row.clone().into();
        active.attempts = Set(attempt);
        active.updated_at = Set(Utc::now());

        let status = match self.gateway.place_order(&request).await {
            Ok(external_order_id) => {
                log::info!(
                    "Fulfillment created: id={} draw_id={} external_order_id={}",
                    row.id,
                    row.draw_id,
                    external_order_id
                );
                active.status = Set(FulfillmentStatus::Created);
                active.external_order_id = Set(Some(external_order_id));
                active.last_error = Set(None);
                FulfillmentStatus::Created
            }
            Err(e) => {
                let status = if attempt >= self.max_attempts {
                    FulfillmentStatus::Abandoned
                } else {
                    FulfillmentStatus::Failed
                };
                log::warn!(
                    "Fulfillment failed: kind=fulfillment_failed id={} draw_id={} attempt={} status={} error={}",
                    row.id,
                    row.draw_id,
                    attempt,
                    status,
                    e
                );
                active.status = Set(status);
                active.last_error = Set(Some(e.to_string()));
                status
            }
        };
        active.update(&self.pool).await?;

        if status == FulfillmentStatus::Created {
            InventoryService::mark_status_on(
                &self.pool,
                row.user_id,
                row.item_id,
                InventoryStatus::PendingDelivery,
            )
            .await?;
        }
        Ok(status)
    }

    /// 需要重试的记录: pending/failed 且冷却期内没有被处理过
    pub async fn due_for_retry(&self, limit: u64) -> AppResult<Vec<i64>> {
        let cutoff = Utc::now() - self.cooldown;
        let ids = fulfillment::Entity::find()
            .filter(
                fulfillment::Column::Status
                    .is_in([FulfillmentStatus::Pending, FulfillmentStatus::Failed]),
            )
            .filter(fulfillment::Column::UpdatedAt.lt(cutoff))
            .order_by_asc(fulfillment::Column::Id)
            .limit(limit)
            .all(&self.pool)
            .await?
            .into_iter()
            .map(|row| row.id)
            .collect();
        Ok(ids)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::test_support::{ItemSeed, seed_item, setup_db};
    use std::sync::Mutex;

    /// Records every request; fails the first `fail_times` calls.
    pub(crate) struct MockGateway {
        pub calls: Mutex<Vec<FulfillmentRequest>>,
        fail_times: Mutex<usize>,
    }

    impl MockGateway {
        pub(crate) fn new(fail_times: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail_times: Mutex::new(fail_times),
            })
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl FulfillmentGateway for MockGateway {
        async fn place_order(&self, request: &FulfillmentRequest) -> AppResult<String> {
            self.calls.lock().unwrap().push(request.clone());
            let mut remaining = self.fail_times.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AppError::ExternalApiError("shop unavailable".into()));
            }
            Ok(format!("HRV-{}", request.draw_id))
        }
    }

    async fn pending_row(db: &DatabaseConnection, external: Option<i64>) -> Option<fulfillment::Model> {
        let mut seed = ItemSeed::new("p1", "Plush", 1);
        if let Some(id) = external {
            seed = seed.external(id);
        }
        let item = seed_item(db, seed).await;
        InventoryService::grant_on(db, 7, item.id).await.unwrap();
        FulfillmentService::create_pending_on(db, Uuid::new_v4(), 7, &item)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_no_row_without_external_product() {
        let db = setup_db().await;
        assert!(pending_row(&db, None).await.is_none());
    }

    #[tokio::test]
    async fn test_process_success_marks_inventory() {
        let db = setup_db().await;
        let row = pending_row(&db, Some(555)).await.unwrap();
        let gateway = MockGateway::new(0);
        let service = FulfillmentService::new(db.clone(), gateway.clone(), 3, 300);

        assert_eq!(service.process(row.id).await.unwrap(), FulfillmentStatus::Created);
        let stored = service.find(row.id).await.unwrap().unwrap();
        assert_eq!(stored.attempts, 1);
        assert_eq!(stored.external_order_id, Some(format!("HRV-{}", row.draw_id)));

        let call = gateway.calls.lock().unwrap()[0].clone();
        assert_eq!(call.product_id, 555);
        assert_eq!(call.customer_id, 7);
        assert_eq!(call.item_name, "Plush");
        assert_eq!(call.pool_id, "p1");

        let entry = InventoryService::new(db)
            .find_entry(7, row.item_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, InventoryStatus::PendingDelivery);

        // terminal rows are not sent twice
        assert_eq!(service.process(row.id).await.unwrap(), FulfillmentStatus::Created);
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failures_then_abandoned() {
        let db = setup_db().await;
        let row = pending_row(&db, Some(555)).await.unwrap();
        let gateway = MockGateway::new(10);
        let service = FulfillmentService::new(db.clone(), gateway.clone(), 2, 300);

        assert_eq!(service.process(row.id).await.unwrap(), FulfillmentStatus::Failed);
        let stored = service.find(row.id).await.unwrap().unwrap();
        assert_eq!(stored.attempts, 1);
        assert!(stored.last_error.unwrap().contains("shop unavailable"));

        assert_eq!(service.process(row.id).await.unwrap(), FulfillmentStatus::Abandoned);
        assert_eq!(service.process(row.id).await.unwrap(), FulfillmentStatus::Abandoned);
        assert_eq!(gateway.call_count(), 2);

        let entry = InventoryService::new(db)
            .find_entry(7, row.item_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, InventoryStatus::Owned);
    }

    #[tokio::test]
    async fn test_due_for_retry_respects_cooldown() {
        let db = setup_db().await;
        let row = pending_row(&db, Some(555)).await.unwrap();

        let cooling = FulfillmentService::new(db.clone(), MockGateway::new(0), 3, 300);
        assert!(cooling.due_for_retry(10).await.unwrap().is_empty());

        let eager = FulfillmentService::new(db.clone(), MockGateway::new(1), 3, 0);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert_eq!(eager.due_for_retry(10).await.unwrap(), vec![row.id]);

        eager.process(row.id).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert_eq!(eager.due_for_retry(10).await.unwrap(), vec![row.id]);

        eager.process(row.id).await.unwrap();
        assert!(eager.due_for_retry(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_queue_reports_closed_worker() {
        let (queue, mut rx) = FulfillmentQueue::channel();
        assert!(queue.enqueue(3));
        assert_eq!(rx.recv().await, Some(3));
        drop(rx);
        assert!(!queue.enqueue(4));
    }
}
