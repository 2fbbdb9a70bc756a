//! Vigia Monitor Server
//!
//! Real-time PBX call monitor: keeps a persistent manager-interface
//! connection to the switch, reconstructs call and extension state from the
//! event stream, and serves live updates and status to operators.

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpResponse, HttpServer};
use std::env;
use std::sync::Arc;
use tracing::info;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vigia_ami::{CallTracker, EventProcessor, MonitorService};
use vigia_api::{configure_monitor, ws_handler, WsBroadcaster};
use vigia_core::traits::CallRepository;
use vigia_core::AppConfig;
use vigia_db::{create_pool, PgBridgeRepository, PgCallRepository, PgExtensionRepository};

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "vigia_monitor={},vigia_ami={},vigia_api={},vigia_db={},actix_web=info,sqlx=warn",
            log_level, log_level, log_level, log_level
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    init_tracing();

    info!("Starting Vigia Monitor v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load()?;

    info!("Connecting to database...");
    let pool = create_pool(
        &config.database.url,
        Some(config.database.max_connections),
    )
    .await?;

    // Wire the monitoring engine: store + broadcast behind their traits
    let broadcaster = Arc::new(WsBroadcaster::new());
    let calls: Arc<dyn CallRepository> = Arc::new(PgCallRepository::new(pool.clone()));
    let tracker = Arc::new(CallTracker::new(
        calls.clone(),
        Arc::new(PgBridgeRepository::new(pool.clone())),
        Arc::new(PgExtensionRepository::new(pool.clone())),
        broadcaster.clone(),
    ));
    let processor = Arc::new(EventProcessor::new(tracker));
    let service = Arc::new(MonitorService::new(config.ami.clone(), processor));

    // The monitor owns its reconnect loop; it runs until stopped or the
    // attempt cap is exceeded
    let monitor = service.clone();
    tokio::spawn(async move {
        monitor.run().await;
    });

    // CORS configuration
    let cors_origins = env::var("CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string());

    let bind_addr = config.server_addr();
    let workers = config.server.workers;
    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, workers
    );

    let http_service = service.clone();
    let http_broadcaster = broadcaster.clone();
    let http_calls = calls.clone();

    HttpServer::new(move || {
        let cors_origins_inner = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                let origins: Vec<&str> = cors_origins_inner.split(',').collect();
                if let Ok(origin_str) = origin.to_str() {
                    origins.iter().any(|o| o.trim() == origin_str)
                } else {
                    false
                }
            })
            .allowed_methods(vec!["GET"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(http_service.clone()))
            .app_data(web::Data::new(http_broadcaster.clone()))
            .app_data(web::Data::new(http_calls.clone()))
            // Middleware
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::NormalizePath::trim())
            // Status surface
            .service(web::scope("/api/v1").configure(configure_monitor))
            // WebSocket endpoint for real-time updates
            .route("/ws", web::get().to(ws_handler))
            // Root redirect to health
            .route(
                "/",
                web::get().to(|| async {
                    HttpResponse::Found()
                        .append_header(("Location", "/api/v1/health"))
                        .finish()
                }),
            )
    })
    .workers(workers)
    .bind(&bind_addr)?
    .run()
    .await?;

    // HTTP server is down; take the monitor with it
    service.stop();

    Ok(())
}
