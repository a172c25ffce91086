use crate::models::*;
use crate::services::BalanceService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/api/v1/balance",
    tag = "balance",
    params(BalanceQuery),
    responses(
        (status = 200, description = "获取余额成功", body = BalanceResponse),
        (status = 400, description = "缺少 customer_id")
    )
)]
/// 获取用户当前 xu 余额
/// 用户从未充值时会初始化为 0
pub async fn get_balance(
    service: web::Data<BalanceService>,
    query: web::Query<BalanceQuery>,
) -> Result<HttpResponse> {
    match service.get_balance(query.customer_id).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn balance_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/balance", web::get().to(get_balance));
}
