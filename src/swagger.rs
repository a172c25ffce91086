use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{FulfillmentStatus, InventoryStatus, OutcomeStatus, Rank};
use crate::handlers;
use crate::models::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::balance::get_balance,
        handlers::gacha::list_items,
        handlers::gacha::draw,
        handlers::gacha::history,
        handlers::gacha::inventory,
        handlers::webhook::order_paid,
    ),
    components(
        schemas(
            BalanceResponse,
            PoolItemResponse,
            DrawRequest,
            DrawResponse,
            WonItem,
            HistoryEntryResponse,
            HistoryPageResponse,
            InventoryItemResponse,
            OrderPaidEvent,
            EventCustomer,
            EventLineItem,
            Rank,
            OutcomeStatus,
            InventoryStatus,
            FulfillmentStatus,
            ApiError,
        )
    ),
    tags(
        (name = "balance", description = "Currency balance API"),
        (name = "gacha", description = "Gacha draw API"),
        (name = "webhook", description = "Shop webhooks"),
    ),
    info(
        title = "Xu Gacha Backend API",
        version = "1.0.0",
        description = "Currency-funded gacha draws with shop top-ups"
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_draw_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/gacha/draw"));
        assert!(doc.paths.paths.contains_key("/webhook/haravan/order-paid"));
    }
}
