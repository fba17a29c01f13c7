use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use mongodb::bson::DateTime;
use serde_json::json;
use validator::Validate;

use crate::db::{load_job, parse_id, DbConn};
use crate::guards::AuthGuard;
use crate::models::CommentDto;
use crate::routes::commit;
use crate::services::ResponseCache;
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Comments")]
#[get("/jobs/<job_id>/comments")]
pub async fn list_comments(
    db: &State<DbConn>,
    job_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let job = load_job(db, &job_id).await?;

    Ok(Json(ApiResponse::success(json!({
        "comments": job.comments,
        "total": job.comments.len(),
    }))))
}

#[openapi(tag = "Comments")]
#[post("/jobs/<job_id>/comments", data = "<dto>")]
pub async fn add_comment(
    db: &State<DbConn>,
    cache: &State<ResponseCache>,
    auth: AuthGuard,
    job_id: String,
    dto: Json<CommentDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    dto.validate()?;

    let mut job = load_job(db, &job_id).await?;
    let now = DateTime::now();
    let comment_id = job.add_comment(auth.user_id, dto.into_inner().message, now)?;
    commit(db, cache, &mut job, now).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Comment added".to_string(),
        json!({ "comment_id": comment_id.to_hex() }),
    )))
}

#[openapi(tag = "Comments")]
#[post("/jobs/<job_id>/comments/<comment_id>/replies", data = "<dto>")]
pub async fn add_reply(
    db: &State<DbConn>,
    cache: &State<ResponseCache>,
    auth: AuthGuard,
    job_id: String,
    comment_id: String,
    dto: Json<CommentDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    dto.validate()?;
    let comment_id = parse_id(&comment_id, "comment")?;

    let mut job = load_job(db, &job_id).await?;
    let now = DateTime::now();
    let reply_id = job.add_reply(&comment_id, auth.user_id, dto.into_inner().message, now)?;
    commit(db, cache, &mut job, now).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Reply added".to_string(),
        json!({ "comment_id": comment_id.to_hex(), "reply_id": reply_id.to_hex() }),
    )))
}
