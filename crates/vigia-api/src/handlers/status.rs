//! Health and monitor status endpoints
//!
//! Lets operators distinguish "still retrying" from "permanently stopped":
//! the status payload carries the running flag, the connection state, the
//! reconnect-attempt counter, and the number of calls currently in flight.

use actix_web::{web, HttpResponse};
use std::sync::Arc;
use vigia_ami::MonitorService;
use vigia_core::traits::CallRepository;
use vigia_core::AppError;

/// Health check endpoint
async fn health(service: web::Data<Arc<MonitorService>>) -> HttpResponse {
    let healthy = service.is_healthy();
    let body = serde_json::json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "service": "vigia-monitor",
        "version": env!("CARGO_PKG_VERSION"),
    });

    if healthy {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

/// Monitor status snapshot
async fn monitor_status(
    service: web::Data<Arc<MonitorService>>,
    calls: web::Data<Arc<dyn CallRepository>>,
) -> Result<HttpResponse, AppError> {
    let status = service.status();
    let active_calls = calls.count_active_calls().await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "running": status.running,
        "state": status.state,
        "reconnect_attempts": status.reconnect_attempts,
        "active_calls": active_calls,
    })))
}

/// Configure health/status routes
pub fn configure_monitor(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .service(web::scope("/monitor").route("/status", web::get().to(monitor_status)));
}
