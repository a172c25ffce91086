pub mod balance;
pub mod gacha;
pub mod webhook;

pub use balance::balance_config;
pub use gacha::gacha_config;
pub use webhook::webhook_config;

use crate::error::AppError;
use actix_web::{HttpResponse, web};

/// 服务状态
pub async fn index() -> HttpResponse {
    HttpResponse::Ok().body("Gacha backend is running")
}

/// Query / JSON 解析失败时也返回统一的错误结构
pub fn extractor_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::ValidationError(err.to_string()).into()),
    )
    .app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::ValidationError(err.to_string()).into()),
    );
}

/// `/api/v1` 下的全部路由
pub fn api_config(cfg: &mut web::ServiceConfig) {
    cfg.configure(balance_config).configure(gacha_config);
}
