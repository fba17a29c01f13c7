use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use mongodb::bson::DateTime;
use serde_json::json;
use validator::Validate;

use crate::db::{load_job, DbConn};
use crate::guards::AuthGuard;
use crate::models::MessageDto;
use crate::routes::commit;
use crate::services::ResponseCache;
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Messages")]
#[get("/jobs/<job_id>/messages")]
pub async fn list_messages(
    db: &State<DbConn>,
    auth: AuthGuard,
    job_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let job = load_job(db, &job_id).await?;
    if !job.is_party(&auth.user_id) {
        return Err(ApiError::forbidden("Only the hirer and the assigned fixer can read messages"));
    }

    let unread = job
        .messages
        .iter()
        .filter(|m| !m.read && m.sender != auth.user_id)
        .count();

    Ok(Json(ApiResponse::success(json!({
        "messages": job.messages,
        "unread": unread,
    }))))
}

#[openapi(tag = "Messages")]
#[post("/jobs/<job_id>/messages", data = "<dto>")]
pub async fn send_message(
    db: &State<DbConn>,
    cache: &State<ResponseCache>,
    auth: AuthGuard,
    job_id: String,
    dto: Json<MessageDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    dto.validate()?;

    let mut job = load_job(db, &job_id).await?;
    let now = DateTime::now();
    let message_id = job.add_message(auth.user_id, dto.into_inner().message, now)?;
    commit(db, cache, &mut job, now).await?;

    Ok(Json(ApiResponse::success(json!({ "message_id": message_id.to_hex() }))))
}

#[openapi(tag = "Messages")]
#[put("/jobs/<job_id>/messages/read")]
pub async fn mark_messages_read(
    db: &State<DbConn>,
    cache: &State<ResponseCache>,
    auth: AuthGuard,
    job_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let mut job = load_job(db, &job_id).await?;
    let now = DateTime::now();
    let marked = job.mark_messages_read(&auth.user_id)?;
    if marked > 0 {
        commit(db, cache, &mut job, now).await?;
    }

    Ok(Json(ApiResponse::success(json!({ "marked_read": marked }))))
}
