use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::Context;
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter

use xu_gacha_backend::{
    AppContext,
    config::Config,
    handlers,
    middlewares::create_cors,
    swagger::swagger_config,
    tasks,
};

fn init_logger() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let config = Config::from_toml().context("Failed to load configuration")?;
    let (ctx, fulfillment_rx) = AppContext::open(config)
        .await
        .context("Failed to initialize application context")?;

    tasks::spawn_all(
        ctx.fulfillment_service.clone(),
        fulfillment_rx,
        ctx.config.fulfillment.retry_interval_secs,
    );

    let host = ctx.config.server.host.clone();
    let port = ctx.config.server.port;
    log::info!("Starting HTTP server at {host}:{port}");

    let app_ctx = ctx.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors(&app_ctx.config.server.cors_allowed_origins))
            .configure(handlers::extractor_config)
            .app_data(web::Data::new(app_ctx.balance_service.clone()))
            .app_data(web::Data::new(app_ctx.pool_service.clone()))
            .app_data(web::Data::new(app_ctx.inventory_service.clone()))
            .app_data(web::Data::new(app_ctx.history_service.clone()))
            .app_data(web::Data::new(app_ctx.draw_service.clone()))
            .app_data(web::Data::new(app_ctx.credit_service.clone()))
            .route("/", web::get().to(handlers::index))
            .configure(swagger_config)
            .configure(handlers::webhook_config)
            .service(web::scope("/api/v1").configure(handlers::api_config))
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    ctx.close().await.context("Failed to close application context")?;
    Ok(())
}
