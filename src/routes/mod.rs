use mongodb::bson::{oid::ObjectId, DateTime, Document};
use mongodb::options::FindOptions;
use serde_json::json;

use crate::db::{find_user, save_job, DbConn, JOBS};
use crate::models::Job;
use crate::services::ResponseCache;
use crate::utils::ApiError;

pub mod admin;
pub mod application;
pub mod comment;
pub mod dispute;
pub mod job;
pub mod message;
pub mod progress;

/// Every cached job listing lives under this prefix.
pub const JOB_CACHE_PREFIX: &str = "jobs:";

/// Saves a mutated job and drops cached listings.
pub(crate) async fn commit(
    db: &DbConn,
    cache: &ResponseCache,
    job: &mut Job,
    now: DateTime,
) -> Result<(), ApiError> {
    save_job(db, job, now).await?;
    let dropped = cache.invalidate_prefix(JOB_CACHE_PREFIX);
    if dropped > 0 {
        debug!("Invalidated {} cached job listings", dropped);
    }
    Ok(())
}

/// Email address and display name for a notification, if the account has one.
/// Lookup failures are logged and swallowed.
pub(crate) async fn contact(db: &DbConn, user_id: &ObjectId) -> Option<(String, String)> {
    match find_user(db, user_id).await {
        Ok(Some(user)) => {
            let name = user.display_name().to_string();
            user.email.map(|email| (email, name))
        }
        Ok(None) => {
            warn!("No account {} to notify", user_id);
            None
        }
        Err(e) => {
            warn!("Could not load account {} for notification: {}", user_id, e.message);
            None
        }
    }
}

pub(crate) async fn find_jobs(
    db: &DbConn,
    filter: Document,
    options: FindOptions,
) -> Result<Vec<Job>, ApiError> {
    let mut cursor = db.collection::<Job>(JOBS).find(filter, options).await?;

    let mut jobs = Vec::new();
    while cursor.advance().await? {
        let job = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;
        jobs.push(job);
    }
    Ok(jobs)
}

pub(crate) fn pagination(page: i64, limit: i64, total: u64) -> serde_json::Value {
    json!({
        "page": page,
        "limit": limit,
        "total": total,
        "pages": (total as f64 / limit as f64).ceil() as i64,
    })
}
