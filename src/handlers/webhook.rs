use crate::error::AppError;
use crate::models::OrderPaidEvent;
use crate::services::CreditService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use log::{error, warn};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/webhook/haravan/order-paid",
    tag = "webhook",
    request_body = OrderPaidEvent,
    responses(
        (status = 200, description = "已接收 (无论是否入账)"),
        (status = 400, description = "事件格式错误"),
        (status = 500, description = "存储故障, 商城会重投")
    )
)]
/// 商城订单付款回调
///
/// 只要事件能解析就返回 200, 是否入账见返回的 outcome;
/// 重复投递由外部订单号去重
pub async fn order_paid(
    body: web::Bytes,
    credit_service: web::Data<CreditService>,
) -> Result<HttpResponse> {
    let event = match OrderPaidEvent::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("Malformed order-paid webhook: {e}");
            return Ok(AppError::ValidationError(format!("Invalid webhook data: {e}")).error_response());
        }
    };

    match credit_service.apply(&event).await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": outcome
        }))),
        Err(e) => {
            error!("Failed to process order-paid webhook: order_id={} error={e}", event.id);
            Ok(e.error_response())
        }
    }
}

/// Webhook 路由 (不在 /api/v1 下)
pub fn webhook_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/webhook").route("/haravan/order-paid", web::post().to(order_paid)),
    );
}
