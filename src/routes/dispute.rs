use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use mongodb::bson::DateTime;
use serde_json::json;
use validator::Validate;

use crate::db::{load_job, DbConn};
use crate::guards::{AdminGuard, AuthGuard};
use crate::models::{RaiseDisputeDto, ResolveDisputeDto};
use crate::routes::{commit, contact};
use crate::services::{EmailService, ResponseCache};
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Disputes")]
#[post("/jobs/<job_id>/dispute", data = "<dto>")]
pub async fn raise_dispute(
    db: &State<DbConn>,
    cache: &State<ResponseCache>,
    auth: AuthGuard,
    job_id: String,
    dto: Json<RaiseDisputeDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    dto.validate()?;
    let dto = dto.into_inner();
    let reason = dto.reason.clone();

    let mut job = load_job(db, &job_id).await?;
    let now = DateTime::now();
    job.raise_dispute(&auth.user_id, dto, now)?;
    commit(db, cache, &mut job, now).await?;

    warn!("Dispute raised on job {} by {}", job_id, auth.user_id);

    let other_party = if job.is_creator(&auth.user_id) {
        job.assigned_to
    } else {
        Some(job.created_by)
    };
    if let Some(other) = other_party {
        if let Some((email, name)) = contact(db, &other).await {
            EmailService::send_dispute_raised(&email, &name, &job.title, &reason).await;
        }
    }

    Ok(Json(ApiResponse::success_with_message(
        "Dispute raised. Our team will review it.".to_string(),
        json!({ "job_id": job_id, "status": job.status, "dispute": job.dispute }),
    )))
}

#[openapi(tag = "Admin - Disputes")]
#[put("/admin/jobs/<job_id>/dispute", data = "<dto>")]
pub async fn resolve_dispute(
    db: &State<DbConn>,
    cache: &State<ResponseCache>,
    admin: AdminGuard,
    job_id: String,
    dto: Json<ResolveDisputeDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    dto.validate()?;
    let dto = dto.into_inner();

    let mut job = load_job(db, &job_id).await?;
    let now = DateTime::now();
    job.resolve_dispute(&admin.user_id, dto.status, dto.resolution, now)?;
    commit(db, cache, &mut job, now).await?;

    info!(
        "Dispute on job {} moved to {} by admin {}",
        job_id,
        job.dispute.status.as_str(),
        admin.user_id
    );

    Ok(Json(ApiResponse::success_with_message(
        "Dispute updated".to_string(),
        json!({ "job_id": job_id, "dispute": job.dispute }),
    )))
}
