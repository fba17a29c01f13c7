use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use mongodb::bson::{doc, DateTime, Document};
use mongodb::options::FindOptions;
use serde_json::json;
use validator::Validate;

use crate::db::{insert_job, load_job, save_job, DbConn, JOBS};
use crate::guards::{AuthGuard, FixerGuard, HirerGuard, Viewer};
use crate::models::{
    CreateJobDto, Job, JobAction, JobFilters, JobStatus, JobSummary, UserRole, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE, page_offset,
};
use crate::routes::{commit, find_jobs, pagination, JOB_CACHE_PREFIX};
use crate::services::ResponseCache;
use crate::utils::{ApiError, ApiResponse};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Status and paging for the owner-scoped and admin job lists.
#[derive(FromForm, serde::Deserialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct JobListQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl JobListQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    /// Adds the status filter, rejecting unknown statuses.
    pub fn apply_status(&self, filter: &mut Document) -> Result<(), ApiError> {
        if let Some(raw) = self.status.as_deref().filter(|s| !s.is_empty()) {
            let status = JobStatus::parse(raw)
                .ok_or_else(|| ApiError::bad_request(format!("Unknown job status '{}'", raw)))?;
            filter.insert("status", status.as_str());
        }
        Ok(())
    }

    pub async fn run(&self, db: &DbConn, mut filter: Document) -> Result<serde_json::Value, ApiError> {
        self.apply_status(&mut filter)?;
        let (page, limit) = (self.page(), self.limit());
        let skip = page_offset(page, limit).map_err(ApiError::bad_request)?;

        let find_options = FindOptions::builder()
            .skip(skip)
            .limit(limit)
            .sort(doc! { "created_at": -1 })
            .build();

        let jobs = find_jobs(db, filter.clone(), find_options).await?;
        let total = db.collection::<Job>(JOBS).count_documents(filter, None).await?;

        let summaries: Vec<JobSummary> = jobs.iter().map(JobSummary::from).collect();
        Ok(json!({
            "jobs": summaries,
            "pagination": pagination(page, limit, total),
        }))
    }
}

#[openapi(tag = "Jobs")]
#[post("/jobs/post", data = "<dto>")]
pub async fn post_job(
    db: &State<DbConn>,
    cache: &State<ResponseCache>,
    hirer: HirerGuard,
    dto: Json<CreateJobDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    dto.validate()?;

    let now = DateTime::now();
    let mut job = Job::new(hirer.user_id, dto.into_inner(), now)?;
    let id = insert_job(db, &mut job, now).await?;
    cache.invalidate_prefix(JOB_CACHE_PREFIX);

    info!("Job {} posted by {}", id, hirer.user_id);

    Ok(Json(ApiResponse::success_with_message(
        "Job posted successfully".to_string(),
        json!({ "job": JobSummary::from(&job) }),
    )))
}

#[openapi(tag = "Jobs")]
#[get("/jobs?<filters..>")]
pub async fn browse_jobs(
    db: &State<DbConn>,
    cache: &State<ResponseCache>,
    filters: JobFilters,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let key = filters.cache_key();
    if let Some(cached) = cache.get(&key) {
        return Ok(Json(ApiResponse::success(cached)));
    }

    let filter = filters.filter_document().map_err(ApiError::bad_request)?;
    let sort = filters.sort().map_err(ApiError::bad_request)?;
    let skip = filters.skip().map_err(ApiError::bad_request)?;

    let find_options = FindOptions::builder()
        .skip(skip)
        .limit(filters.limit())
        .sort(sort.document())
        .build();

    let jobs = find_jobs(db, filter.clone(), find_options).await?;
    let total = db.collection::<Job>(JOBS).count_documents(filter, None).await?;

    let summaries: Vec<JobSummary> = jobs.iter().map(JobSummary::from).collect();
    let body = json!({
        "jobs": summaries,
        "pagination": pagination(filters.page(), filters.limit(), total),
    });
    cache.insert(key, body.clone());

    Ok(Json(ApiResponse::success(body)))
}

#[openapi(tag = "Jobs")]
#[get("/jobs/mine?<query..>")]
pub async fn my_jobs(
    db: &State<DbConn>,
    hirer: HirerGuard,
    query: JobListQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let body = query.run(db, doc! { "created_by": hirer.user_id }).await?;
    Ok(Json(ApiResponse::success(body)))
}

#[openapi(tag = "Jobs")]
#[get("/jobs/assigned?<query..>")]
pub async fn assigned_jobs(
    db: &State<DbConn>,
    fixer: FixerGuard,
    query: JobListQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let body = query.run(db, doc! { "assigned_to": fixer.user_id }).await?;
    Ok(Json(ApiResponse::success(body)))
}

#[openapi(tag = "Jobs")]
#[get("/jobs/<job_id>")]
pub async fn get_job(
    db: &State<DbConn>,
    viewer: Viewer,
    job_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let mut job = load_job(db, &job_id).await?;
    let now = DateTime::now();

    if let Some(auth) = &viewer.0 {
        if job.add_view(&auth.user_id, now) {
            // Listings carry no view data, so cached pages stay valid.
            if let Err(e) = save_job(db, &mut job, now).await {
                debug!("View on job {} not recorded: {}", job_id, e.message);
            }
        }
    }

    Ok(Json(ApiResponse::success(job_detail(&job, viewer.0.as_ref(), now)?)))
}

/// Full job document. Applications and the view log are shown only to the
/// creator, private messages only to the parties.
fn job_detail(job: &Job, viewer: Option<&AuthGuard>, now: DateTime) -> Result<serde_json::Value, ApiError> {
    let mut value = serde_json::to_value(job)
        .map_err(|e| ApiError::internal_error(format!("Serialization error: {}", e)))?;

    let is_creator = viewer.map(|v| job.is_creator(&v.user_id)).unwrap_or(false);
    let is_party = viewer.map(|v| job.is_party(&v.user_id)).unwrap_or(false);
    let can_apply = viewer
        .filter(|v| v.role == UserRole::Fixer)
        .map(|v| job.can_apply(&v.user_id, now))
        .unwrap_or(false);

    if let Some(fields) = value.as_object_mut() {
        if !is_creator {
            fields.remove("applications");
            if let Some(views) = fields.get_mut("views").and_then(|v| v.as_object_mut()) {
                views.remove("viewed_by");
            }
        }
        if !is_party {
            fields.remove("messages");
        }
        fields.insert("applications_count".to_string(), json!(job.active_application_count()));
        fields.insert(
            "viewer".to_string(),
            json!({
                "is_creator": is_creator,
                "is_party": is_party,
                "can_apply": can_apply,
            }),
        );
    }
    Ok(value)
}

#[openapi(tag = "Jobs")]
#[put("/jobs/<job_id>", data = "<action>")]
pub async fn update_job(
    db: &State<DbConn>,
    cache: &State<ResponseCache>,
    auth: AuthGuard,
    job_id: String,
    action: Json<JobAction>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let mut job = load_job(db, &job_id).await?;
    let now = DateTime::now();

    let message = match action.into_inner() {
        JobAction::UpdateDetails(dto) => {
            dto.validate()?;
            job.update_details(&auth.user_id, dto, now)?;
            "Job updated successfully"
        }
        JobAction::Cancel(dto) => {
            dto.validate()?;
            job.cancel(&auth.user_id, dto.reason, dto.refund_amount, now)?;
            "Job cancelled"
        }
        JobAction::Feature(dto) => {
            dto.validate()?;
            let until = DateTime::from_millis(now.timestamp_millis() + dto.days * DAY_MS);
            job.feature(&auth.user_id, until, now)?;
            "Job featured"
        }
    };

    commit(db, cache, &mut job, now).await?;
    info!("Job {} changed by {}: {}", job_id, auth.user_id, message);

    Ok(Json(ApiResponse::success_with_message(
        message.to_string(),
        json!({ "job": JobSummary::from(&job) }),
    )))
}
