//! Background tasks.
//!
//! - fulfillment worker: consumes ids queued by successful draws
//! - fulfillment retry: periodically re-processes pending/failed orders
//!
//! Call `spawn_all` once during startup.

use crate::services::FulfillmentService;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

const RETRY_BATCH: u64 = 100;

/// Spawn all background tasks. Detached; does not block.
pub fn spawn_all(
    fulfillment_service: FulfillmentService,
    queue: UnboundedReceiver<i64>,
    retry_interval_secs: u64,
) {
    spawn_fulfillment_worker(fulfillment_service.clone(), queue);
    spawn_fulfillment_retry(fulfillment_service, retry_interval_secs);
}

/// 处理抽奖后排队的履约; 队列关闭 (所有发送端释放) 时退出
pub fn spawn_fulfillment_worker(
    svc: FulfillmentService,
    mut queue: UnboundedReceiver<i64>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(id) = queue.recv().await {
            if let Err(e) = svc.process(id).await {
                log::error!("Fulfillment worker failed on order {id}: {e:?}");
            }
        }
        log::info!("Fulfillment queue closed, worker exiting");
    })
}

/// 履约重试 (按 retry_interval_secs)
pub fn spawn_fulfillment_retry(svc: FulfillmentService, retry_interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = std::time::Duration::from_secs(retry_interval_secs.max(1));
        loop {
            tokio::time::sleep(interval).await;
            match svc.due_for_retry(RETRY_BATCH).await {
                Ok(ids) => {
                    if !ids.is_empty() {
                        log::info!("Retrying {} fulfillment orders", ids.len());
                    }
                    for id in ids {
                        if let Err(e) = svc.process(id).await {
                            log::error!("Fulfillment retry failed on order {id}: {e:?}");
                        }
                    }
                }
                Err(e) => log::error!("Failed to load fulfillment retries: {e:?}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::FulfillmentStatus;
    use crate::services::fulfillment_service::tests::MockGateway;
    use crate::services::{FulfillmentQueue, InventoryService};
    use crate::test_support::{ItemSeed, seed_item, setup_db};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_worker_drains_queue_then_exits() {
        let db = setup_db().await;
        let item = seed_item(&db, ItemSeed::new("p1", "Plush", 1).external(321)).await;
        InventoryService::grant_on(&db, 3, item.id).await.unwrap();
        let row = FulfillmentService::create_pending_on(&db, Uuid::new_v4(), 3, &item)
            .await
            .unwrap()
            .unwrap();

        let gateway = MockGateway::new(0);
        let svc = FulfillmentService::new(db.clone(), gateway.clone(), 3, 300);
        let (queue, rx) = FulfillmentQueue::channel();
        let handle = spawn_fulfillment_worker(svc.clone(), rx);

        assert!(queue.enqueue(row.id));
        drop(queue);
        handle.await.unwrap();

        assert_eq!(gateway.call_count(), 1);
        let stored = svc.find(row.id).await.unwrap().unwrap();
        assert_eq!(stored.status, FulfillmentStatus::Created);
    }
}
