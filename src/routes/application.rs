use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use mongodb::bson::{oid::ObjectId, DateTime};
use serde_json::json;
use validator::Validate;

use crate::db::{load_job, parse_id, DbConn};
use crate::guards::{AuthGuard, FixerGuard, HirerGuard};
use crate::models::{ApplicationResponse, ApplicationStatus, ApplyDto, Job};
use crate::routes::{commit, contact};
use crate::services::{EmailService, ResponseCache};
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Applications")]
#[post("/jobs/<job_id>/apply", data = "<dto>")]
pub async fn apply_to_job(
    db: &State<DbConn>,
    cache: &State<ResponseCache>,
    fixer: FixerGuard,
    job_id: String,
    dto: Json<ApplyDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    dto.validate()?;

    let mut job = load_job(db, &job_id).await?;
    let now = DateTime::now();
    let application_id = job.apply(fixer.user_id, dto.into_inner(), now)?;
    commit(db, cache, &mut job, now).await?;

    info!("Fixer {} applied to job {}", fixer.user_id, job_id);

    if let Some((email, name)) = contact(db, &job.created_by).await {
        EmailService::send_application_received(&email, &name, &job.title).await;
    }

    Ok(Json(ApiResponse::success_with_message(
        "Application submitted successfully".to_string(),
        json!({
            "application_id": application_id.to_hex(),
            "applications_count": job.active_application_count(),
        }),
    )))
}

#[openapi(tag = "Applications")]
#[get("/jobs/<job_id>/applications")]
pub async fn list_applications(
    db: &State<DbConn>,
    auth: AuthGuard,
    job_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let job = load_job(db, &job_id).await?;
    if !job.is_creator(&auth.user_id) {
        return Err(ApiError::forbidden("Only the job creator can view applications"));
    }

    let applications: Vec<ApplicationResponse> = job
        .applications
        .iter()
        .filter(|a| a.is_active())
        .map(ApplicationResponse::from)
        .collect();
    let pending = job
        .applications
        .iter()
        .filter(|a| a.status == ApplicationStatus::Pending)
        .count();

    Ok(Json(ApiResponse::success(json!({
        "job_id": job_id,
        "applications": applications,
        "total": applications.len(),
        "pending": pending,
    }))))
}

#[openapi(tag = "Applications")]
#[get("/jobs/<job_id>/can-apply")]
pub async fn can_apply(
    db: &State<DbConn>,
    fixer: FixerGuard,
    job_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let job = load_job(db, &job_id).await?;
    let verdict = job.check_can_apply(&fixer.user_id, DateTime::now());

    Ok(Json(ApiResponse::success(json!({
        "can_apply": verdict.is_ok(),
        "reason": verdict.err().map(|e| e.to_string()),
    }))))
}

#[openapi(tag = "Applications")]
#[get("/jobs/<job_id>/applications/mine")]
pub async fn my_application(
    db: &State<DbConn>,
    fixer: FixerGuard,
    job_id: String,
) -> Result<Json<ApiResponse<ApplicationResponse>>, ApiError> {
    let job = load_job(db, &job_id).await?;
    Ok(Json(ApiResponse::success(own_application(&job, &fixer.user_id)?)))
}

/// The fixer's latest application on the job, withdrawn or not.
fn own_application(job: &Job, fixer: &ObjectId) -> Result<ApplicationResponse, ApiError> {
    job.application_by_fixer(fixer)
        .map(ApplicationResponse::from)
        .ok_or_else(|| ApiError::not_found("You have not applied to this job"))
}

#[openapi(tag = "Applications")]
#[put("/jobs/<job_id>/applications/withdraw")]
pub async fn withdraw_application(
    db: &State<DbConn>,
    cache: &State<ResponseCache>,
    fixer: FixerGuard,
    job_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let mut job = load_job(db, &job_id).await?;
    let now = DateTime::now();
    let application_id = job.withdraw_application(&fixer.user_id)?;
    commit(db, cache, &mut job, now).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Application withdrawn".to_string(),
        json!({ "application_id": application_id.to_hex() }),
    )))
}

#[openapi(tag = "Applications")]
#[put("/jobs/<job_id>/applications/<application_id>/accept")]
pub async fn accept_application(
    db: &State<DbConn>,
    cache: &State<ResponseCache>,
    hirer: HirerGuard,
    job_id: String,
    application_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let application_id = parse_id(&application_id, "application")?;
    let mut job = load_job(db, &job_id).await?;
    let now = DateTime::now();

    let fixer = job.accept_application(&hirer.user_id, &application_id, now)?;
    commit(db, cache, &mut job, now).await?;

    info!("Job {} assigned to fixer {}", job_id, fixer);

    if let Some((email, name)) = contact(db, &fixer).await {
        EmailService::send_application_accepted(&email, &name, &job.title).await;
    }

    Ok(Json(ApiResponse::success_with_message(
        "Application accepted. The job is now in progress.".to_string(),
        json!({
            "job_id": job_id,
            "assigned_to": fixer.to_hex(),
            "status": job.status,
        }),
    )))
}

#[openapi(tag = "Applications")]
#[put("/jobs/<job_id>/applications/<application_id>/reject")]
pub async fn reject_application(
    db: &State<DbConn>,
    cache: &State<ResponseCache>,
    hirer: HirerGuard,
    job_id: String,
    application_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let application_id = parse_id(&application_id, "application")?;
    let mut job = load_job(db, &job_id).await?;
    let now = DateTime::now();

    job.reject_application(&hirer.user_id, &application_id)?;
    commit(db, cache, &mut job, now).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Application rejected".to_string(),
        json!({ "application_id": application_id.to_hex() }),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::*;
    use rocket::http::Status;

    #[test]
    fn own_application_is_the_latest_one() {
        let hirer = ObjectId::new();
        let fixer = ObjectId::new();
        let mut job = open_job(hirer);

        let first = job.apply(fixer, proposal(400.0), now()).unwrap();
        job.withdraw_application(&fixer).unwrap();
        let second = job.apply(fixer, proposal(420.0), now()).unwrap();

        let mine = own_application(&job, &fixer).unwrap();
        assert_eq!(mine.id, second.to_hex());
        assert_ne!(mine.id, first.to_hex());
        assert_eq!(mine.status, ApplicationStatus::Pending);
        assert_eq!(mine.proposed_amount, 420.0);
    }

    #[test]
    fn withdrawn_application_is_still_reported() {
        let hirer = ObjectId::new();
        let fixer = ObjectId::new();
        let mut job = open_job(hirer);
        job.apply(fixer, proposal(400.0), now()).unwrap();
        job.withdraw_application(&fixer).unwrap();

        let mine = own_application(&job, &fixer).unwrap();
        assert_eq!(mine.status, ApplicationStatus::Withdrawn);
    }

    #[test]
    fn other_fixers_get_not_found() {
        let hirer = ObjectId::new();
        let mut job = open_job(hirer);
        job.apply(ObjectId::new(), proposal(400.0), now()).unwrap();

        let err = own_application(&job, &ObjectId::new()).unwrap_err();
        assert_eq!(err.status, Status::NotFound);
    }
}
