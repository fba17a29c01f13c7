use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use mongodb::bson::DateTime;
use serde_json::json;
use validator::Validate;

use crate::db::{load_job, parse_id, DbConn};
use crate::guards::{FixerGuard, HirerGuard};
use crate::models::{MarkDoneDto, MilestoneDto, RatingDto, WorkImageDto};
use crate::routes::{commit, contact};
use crate::services::{EmailService, ResponseCache};
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Progress")]
#[post("/jobs/<job_id>/mark-done", data = "<dto>")]
pub async fn mark_done(
    db: &State<DbConn>,
    cache: &State<ResponseCache>,
    fixer: FixerGuard,
    job_id: String,
    dto: Json<MarkDoneDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    dto.validate()?;
    let dto = dto.into_inner();

    let mut job = load_job(db, &job_id).await?;
    let now = DateTime::now();
    job.mark_done(&fixer.user_id, dto.notes, dto.after_images, now)?;
    commit(db, cache, &mut job, now).await?;

    info!("Job {} marked done by {}", job_id, fixer.user_id);

    if let Some((email, name)) = contact(db, &job.created_by).await {
        EmailService::send_job_marked_done(&email, &name, &job.title).await;
    }

    Ok(Json(ApiResponse::success_with_message(
        "Job marked as done. Waiting for the hirer to confirm.".to_string(),
        json!({ "job_id": job_id, "status": job.status }),
    )))
}

#[openapi(tag = "Progress")]
#[post("/jobs/<job_id>/confirm-completion", data = "<dto>")]
pub async fn confirm_completion(
    db: &State<DbConn>,
    cache: &State<ResponseCache>,
    hirer: HirerGuard,
    job_id: String,
    dto: Json<RatingDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    dto.validate()?;
    let dto = dto.into_inner();

    let mut job = load_job(db, &job_id).await?;
    let now = DateTime::now();
    job.confirm_completion(&hirer.user_id, dto.rating, dto.review, now)?;
    commit(db, cache, &mut job, now).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Completion confirmed".to_string(),
        json!({ "job_id": job_id, "fixer_rating": job.completion.fixer_rating }),
    )))
}

#[openapi(tag = "Progress")]
#[post("/jobs/<job_id>/rate-hirer", data = "<dto>")]
pub async fn rate_hirer(
    db: &State<DbConn>,
    cache: &State<ResponseCache>,
    fixer: FixerGuard,
    job_id: String,
    dto: Json<RatingDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    dto.validate()?;
    let dto = dto.into_inner();

    let mut job = load_job(db, &job_id).await?;
    let now = DateTime::now();
    job.rate_hirer(&fixer.user_id, dto.rating, dto.review, now)?;
    commit(db, cache, &mut job, now).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Thanks for rating the hirer".to_string(),
        json!({ "job_id": job_id, "hirer_rating": job.completion.hirer_rating }),
    )))
}

#[openapi(tag = "Progress")]
#[post("/jobs/<job_id>/milestones", data = "<dto>")]
pub async fn add_milestone(
    db: &State<DbConn>,
    cache: &State<ResponseCache>,
    fixer: FixerGuard,
    job_id: String,
    dto: Json<MilestoneDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    dto.validate()?;

    let mut job = load_job(db, &job_id).await?;
    let now = DateTime::now();
    let milestone_id = job.add_milestone(&fixer.user_id, dto.into_inner().title)?;
    commit(db, cache, &mut job, now).await?;

    Ok(Json(ApiResponse::success(json!({
        "milestone_id": milestone_id.to_hex(),
        "milestones": job.progress.milestones,
    }))))
}

#[openapi(tag = "Progress")]
#[put("/jobs/<job_id>/milestones/<milestone_id>/complete")]
pub async fn complete_milestone(
    db: &State<DbConn>,
    cache: &State<ResponseCache>,
    fixer: FixerGuard,
    job_id: String,
    milestone_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let milestone_id = parse_id(&milestone_id, "milestone")?;
    let mut job = load_job(db, &job_id).await?;
    let now = DateTime::now();
    job.complete_milestone(&fixer.user_id, &milestone_id, now)?;
    commit(db, cache, &mut job, now).await?;

    let done = job.progress.milestones.iter().filter(|m| m.completed).count();
    Ok(Json(ApiResponse::success(json!({
        "milestone_id": milestone_id.to_hex(),
        "completed": done,
        "total": job.progress.milestones.len(),
    }))))
}

#[openapi(tag = "Progress")]
#[post("/jobs/<job_id>/work-images", data = "<dto>")]
pub async fn add_work_image(
    db: &State<DbConn>,
    cache: &State<ResponseCache>,
    fixer: FixerGuard,
    job_id: String,
    dto: Json<WorkImageDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    dto.validate()?;

    let mut job = load_job(db, &job_id).await?;
    let now = DateTime::now();
    job.add_work_image(&fixer.user_id, dto.into_inner().url)?;
    commit(db, cache, &mut job, now).await?;

    Ok(Json(ApiResponse::success(json!({
        "work_images": job.progress.work_images,
    }))))
}
