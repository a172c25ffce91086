//! Application wiring: database, services and the fulfillment channel.

use crate::config::Config;
use crate::database::{DbPool, create_pool, run_migrations};
use crate::error::AppResult;
use crate::external::HaravanClient;
use crate::services::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Clone)]
pub struct AppContext {
    pub config: Config,
    pub pool: DbPool,
    pub balance_service: BalanceService,
    pub pool_service: PoolService,
    pub inventory_service: InventoryService,
    pub history_service: HistoryService,
    pub draw_service: DrawService,
    pub credit_service: CreditService,
    pub fulfillment_service: FulfillmentService,
}

impl AppContext {
    /// 连接数据库并执行迁移, 构建全部服务.
    /// 返回的 receiver 交给 `tasks::spawn_all` 消费
    pub async fn open(config: Config) -> AppResult<(Self, UnboundedReceiver<i64>)> {
        let pool = create_pool(&config.database).await?;
        run_migrations(&pool).await?;

        let gateway = HaravanClient::new(
            config.haravan.clone(),
            Duration::from_secs(config.fulfillment.request_timeout_secs),
        )?;
        let (queue, rx) = FulfillmentQueue::channel();

        let ctx = Self {
            balance_service: BalanceService::new(pool.clone()),
            pool_service: PoolService::new(pool.clone()),
            inventory_service: InventoryService::new(pool.clone()),
            history_service: HistoryService::new(pool.clone()),
            draw_service: DrawService::new(pool.clone(), queue),
            credit_service: CreditService::new(pool.clone(), config.currency.clone()),
            fulfillment_service: FulfillmentService::new(
                pool.clone(),
                Arc::new(gateway),
                config.fulfillment.max_attempts,
                config.fulfillment.retry_interval_secs,
            ),
            pool,
            config,
        };
        Ok((ctx, rx))
    }

    pub async fn close(self) -> AppResult<()> {
        log::info!("Closing database pool");
        self.pool.close().await?;
        Ok(())
    }
}
