use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use mongodb::bson::doc;
use serde_json::json;

use crate::db::DbConn;
use crate::guards::AdminGuard;
use crate::routes::job::JobListQuery;
use crate::services::{PerformanceMonitor, ResponseCache};
use crate::utils::{ApiError, ApiResponse};

// ============================================================================
// ADMIN - JOBS
// ============================================================================

#[openapi(tag = "Admin - Jobs")]
#[get("/admin/jobs?<query..>")]
pub async fn get_all_jobs(
    db: &State<DbConn>,
    _admin: AdminGuard,
    query: JobListQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let body = query.run(db, doc! {}).await?;
    Ok(Json(ApiResponse::success(body)))
}

// ============================================================================
// ADMIN - PERFORMANCE
// ============================================================================

#[openapi(tag = "Admin - Performance")]
#[get("/admin/performance")]
pub async fn get_performance(
    _admin: AdminGuard,
    cache: &State<ResponseCache>,
    monitor: &State<PerformanceMonitor>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    Ok(Json(ApiResponse::success(json!({
        "cache": cache.stats(),
        "routes": monitor.snapshot(),
    }))))
}
