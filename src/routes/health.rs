use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::db::{self, DbPool};

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    status: &'static str,
    storage: &'static str,
}

/// Liveness check - is the process running?
pub async fn liveness() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse { status: "ok" })
}

/// Readiness check - can we reach the database?
/// Returns 503 while storage is unavailable so load balancers hold traffic.
pub async fn readiness(pool: web::Data<DbPool>) -> HttpResponse {
    if db::health_check(pool.get_ref()).await {
        HttpResponse::Ok().json(ReadinessResponse {
            status: "ready",
            storage: "ok",
        })
    } else {
        HttpResponse::ServiceUnavailable().json(ReadinessResponse {
            status: "not_ready",
            storage: "error",
        })
    }
}
