use actix_cors::Cors;

/// 空列表表示允许任意来源 (商城主题页面域名不固定)
pub fn create_cors(allowed_origins: &[String]) -> Cors {
    let cors = if allowed_origins.is_empty() {
        Cors::default().allowed_origin_fn(|_, _req_head| true)
    } else {
        allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };
    cors.allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_any_header()
        .max_age(3600)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{App, HttpResponse, test, web};

    #[actix_web::test]
    async fn test_listed_origin_is_allowed() {
        let origins = vec!["https://shop.example.com".to_string()];
        let app = test::init_service(
            App::new()
                .wrap(create_cors(&origins))
                .route("/", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/")
            .insert_header(("Origin", "https://shop.example.com"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("https://shop.example.com")
        );
    }
}
