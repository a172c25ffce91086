use crate::models::*;
use crate::services::{DrawCommand, DrawService, HistoryService, InventoryService, PoolService};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

/// 请求方地址 (优先 X-Forwarded-For / Forwarded)
fn client_ip(req: &HttpRequest) -> Option<String> {
    req.connection_info()
        .realip_remote_addr()
        .map(|addr| addr.to_string())
}

#[utoipa::path(
    get,
    path = "/api/v1/gacha/items",
    tag = "gacha",
    params(ItemsQuery),
    responses(
        (status = 200, description = "获取物品列表成功", body = [PoolItemResponse])
    )
)]
/// 启用物品列表, 稀有度高的在前
pub async fn list_items(
    service: web::Data<PoolService>,
    query: web::Query<ItemsQuery>,
) -> Result<HttpResponse> {
    match service.list_items(query.pool_id.as_deref()).await {
        Ok(list) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": list }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/gacha/draw",
    tag = "gacha",
    request_body = DrawRequest,
    responses(
        (status = 200, description = "抽奖成功", body = DrawResponse),
        (status = 400, description = "参数错误"),
        (status = 402, description = "余额不足 (status = rejected)"),
        (status = 404, description = "奖池没有可抽物品 (status = refunded)"),
        (status = 500, description = "奖池配置错误或内部错误 (status = refunded / refund_failed)")
    )
)]
/// 进行一次抽奖:
/// 1. 条件扣款 (余额不足直接拒绝)
/// 2. 按权重抽取
/// 3. 同一事务内写入库存与历史
/// 4. 失败时退回扣款并记录
pub async fn draw(
    service: web::Data<DrawService>,
    req: HttpRequest,
    payload: web::Json<DrawRequest>,
) -> Result<HttpResponse> {
    let payload = payload.into_inner();
    let cmd = DrawCommand {
        user_id: payload.customer_id,
        pool_id: payload.pool_id,
        cost: payload.cost,
        client_ip: client_ip(&req),
    };
    match service.execute_draw(cmd).await {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": result }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/gacha/history",
    tag = "gacha",
    params(HistoryQuery),
    responses(
        (status = 200, description = "获取抽奖历史成功", body = HistoryPageResponse)
    )
)]
/// 抽奖历史 (最新在前)
pub async fn history(
    service: web::Data<HistoryService>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse> {
    match service.list(&query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/gacha/inventory",
    tag = "gacha",
    params(InventoryQuery),
    responses(
        (status = 200, description = "获取库存成功", body = [InventoryItemResponse])
    )
)]
pub async fn inventory(
    service: web::Data<InventoryService>,
    query: web::Query<InventoryQuery>,
) -> Result<HttpResponse> {
    match service.list_for_user(query.customer_id).await {
        Ok(list) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": list }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 路由配置
pub fn gacha_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/gacha")
            .route("/items", web::get().to(list_items))
            .route("/draw", web::post().to(draw))
            .route("/history", web::get().to(history))
            .route("/inventory", web::get().to(inventory)),
    );
}
